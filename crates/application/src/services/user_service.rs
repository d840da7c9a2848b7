use std::sync::Arc;

use domain::{Cpf, PersonName, ProfileChanges, User, UserEmail, UserId};
use validator::Validate;

use crate::{
    clock::Clock,
    dto::{RegisterInput, UpdateUserInput, UserDto},
    error::ApplicationError,
    password::PasswordHasher,
    repository::UserRepository,
};

pub struct UserServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
}

pub struct UserService {
    deps: UserServiceDependencies,
}

fn user_not_found(id: UserId) -> ApplicationError {
    ApplicationError::not_found(format!("User with ID \"{id}\" not found."))
}

impl UserService {
    pub fn new(deps: UserServiceDependencies) -> Self {
        Self { deps }
    }

    /// 创建用户：先校验输入，再检查 email/cpf 唯一性，最后哈希密码并落库
    pub async fn create(&self, input: RegisterInput) -> Result<User, ApplicationError> {
        input.validate()?;
        let name = PersonName::parse(input.name)?;
        let email = UserEmail::parse(input.email)?;
        let cpf = Cpf::parse(input.cpf)?;

        let repo = &self.deps.user_repository;
        if repo.find_by_email(&email).await?.is_some() {
            return Err(ApplicationError::conflict("email"));
        }
        if repo.find_by_cpf(&cpf).await?.is_some() {
            return Err(ApplicationError::conflict("cpf"));
        }

        let password = self.deps.password_hasher.hash(&input.password).await?;
        let user = User::register(
            UserId::generate(),
            name,
            email,
            cpf,
            password,
            self.deps.clock.now(),
        );

        // 并发注册仍可能撞上唯一约束，由存储层返回 Conflict
        let stored = repo.create(user).await?;
        tracing::info!(user_id = %stored.id, "user created");
        Ok(stored)
    }

    /// 校验邮箱和密码，失败时不区分是邮箱不存在还是密码错误
    pub async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, ApplicationError> {
        let Ok(email) = UserEmail::parse(email) else {
            return Ok(None);
        };
        let Some(user) = self.deps.user_repository.find_by_email(&email).await? else {
            tracing::warn!("login attempt for unknown email");
            return Ok(None);
        };
        if !self
            .deps
            .password_hasher
            .verify(password, &user.password)
            .await?
        {
            tracing::warn!(user_id = %user.id, "login attempt with wrong password");
            return Ok(None);
        }
        Ok(Some(user))
    }

    pub async fn list(&self) -> Result<Vec<UserDto>, ApplicationError> {
        let users = self.deps.user_repository.list().await?;
        Ok(users.iter().map(UserDto::from).collect())
    }

    pub async fn get(&self, id: UserId) -> Result<UserDto, ApplicationError> {
        self.deps
            .user_repository
            .find_by_id(id)
            .await?
            .map(|user| UserDto::from(&user))
            .ok_or_else(|| user_not_found(id))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserDto>, ApplicationError> {
        let Ok(email) = UserEmail::parse(email) else {
            return Ok(None);
        };
        let user = self.deps.user_repository.find_by_email(&email).await?;
        Ok(user.as_ref().map(UserDto::from))
    }

    pub async fn find_by_cpf(&self, cpf: &str) -> Result<Option<UserDto>, ApplicationError> {
        let Ok(cpf) = Cpf::parse(cpf) else {
            return Ok(None);
        };
        let user = self.deps.user_repository.find_by_cpf(&cpf).await?;
        Ok(user.as_ref().map(UserDto::from))
    }

    pub async fn update(
        &self,
        id: UserId,
        input: UpdateUserInput,
    ) -> Result<UserDto, ApplicationError> {
        input.validate()?;
        let repo = &self.deps.user_repository;
        let mut user = repo.find_by_id(id).await?.ok_or_else(|| user_not_found(id))?;

        let mut changes = ProfileChanges {
            name: input.name.map(PersonName::parse).transpose()?,
            email: input.email.map(UserEmail::parse).transpose()?,
            cpf: input.cpf.map(Cpf::parse).transpose()?,
            password: None,
        };

        if let Some(email) = changes.email.as_ref().filter(|email| **email != user.email) {
            if repo.find_by_email(email).await?.is_some() {
                return Err(ApplicationError::conflict("email"));
            }
        }
        if let Some(cpf) = changes.cpf.as_ref().filter(|cpf| **cpf != user.cpf) {
            if repo.find_by_cpf(cpf).await?.is_some() {
                return Err(ApplicationError::conflict("cpf"));
            }
        }
        if let Some(password) = input.password {
            changes.password = Some(self.deps.password_hasher.hash(&password).await?);
        }

        user.apply(changes, self.deps.clock.now());
        let stored = repo.update(user).await?;
        tracing::info!(user_id = %id, "user updated");
        Ok(UserDto::from(&stored))
    }

    pub async fn delete(&self, id: UserId) -> Result<(), ApplicationError> {
        self.deps
            .user_repository
            .delete(id)
            .await
            .map_err(|err| match err {
                domain::RepositoryError::NotFound => user_not_found(id),
                other => other.into(),
            })?;
        tracing::info!(user_id = %id, "user deleted");
        Ok(())
    }
}
