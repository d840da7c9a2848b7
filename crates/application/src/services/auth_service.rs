use std::sync::Arc;

use domain::User;
use validator::Validate;

use crate::{
    auth::{TokenIssuer, TokenPair},
    dto::{AuthSession, LoginInput, RegisterInput, UserDto},
    error::ApplicationError,
    password::TokenHasher,
    services::UserService,
};

const INVALID_CREDENTIALS: &str = "Invalid credentials provided.";

pub struct AuthServiceDependencies {
    pub user_service: Arc<UserService>,
    pub token_issuer: Arc<TokenIssuer>,
    pub token_hasher: Arc<dyn TokenHasher>,
}

/// 登录会话生命周期：注册、登录、登出、刷新
pub struct AuthService {
    deps: AuthServiceDependencies,
}

impl AuthService {
    pub fn new(deps: AuthServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn register(&self, input: RegisterInput) -> Result<AuthSession, ApplicationError> {
        let user = self.deps.user_service.create(input).await?;
        self.start_session(user).await
    }

    pub async fn login(&self, input: LoginInput) -> Result<AuthSession, ApplicationError> {
        input.validate()?;
        let user = self
            .deps
            .user_service
            .verify_credentials(&input.email, &input.password)
            .await?
            .ok_or_else(|| ApplicationError::authentication(INVALID_CREDENTIALS))?;

        self.start_session(user).await
    }

    pub async fn logout(&self, user: &User) -> Result<bool, ApplicationError> {
        self.deps.token_issuer.revoke(user.id).await?;
        tracing::info!(user_id = %user.id, "user logged out");
        Ok(true)
    }

    /// `user` 必须已经过刷新策略校验，`refresh_token` 是校验时使用的原始令牌
    pub async fn refresh(
        &self,
        user: &User,
        refresh_token: &str,
    ) -> Result<TokenPair, ApplicationError> {
        let presented = self.deps.token_hasher.digest(refresh_token);
        let tokens = self
            .deps
            .token_issuer
            .rotate(user.id, &user.email, &presented)
            .await?;
        tracing::info!(user_id = %user.id, "tokens refreshed");
        Ok(tokens)
    }

    async fn start_session(&self, user: User) -> Result<AuthSession, ApplicationError> {
        let tokens = self.deps.token_issuer.issue(user.id, &user.email).await?;
        tracing::info!(user_id = %user.id, "session started");
        Ok(AuthSession {
            user: UserDto::from(&user),
            tokens,
        })
    }
}
