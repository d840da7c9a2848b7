use serde::{Deserialize, Serialize};

use crate::value_objects::{
    Cpf, PasswordHash, PersonName, RefreshTokenHash, Timestamp, UserEmail, UserId,
};

/// 用户身份记录。
///
/// `refresh_token_hash` 为空表示当前没有活跃会话；每次登录、刷新或登出都会改写它。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: PersonName,
    pub email: UserEmail,
    pub cpf: Cpf,
    #[serde(skip_serializing)] // 密码字段不暴露给客户端
    pub password: PasswordHash,
    #[serde(skip_serializing, default)]
    pub refresh_token_hash: Option<RefreshTokenHash>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// 部分更新，`None` 表示保持原值。
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<PersonName>,
    pub email: Option<UserEmail>,
    pub cpf: Option<Cpf>,
    pub password: Option<PasswordHash>,
}

impl User {
    pub fn register(
        id: UserId,
        name: PersonName,
        email: UserEmail,
        cpf: Cpf,
        password: PasswordHash,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            name,
            email,
            cpf,
            password,
            refresh_token_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, changes: ProfileChanges, now: Timestamp) {
        if let Some(name) = changes.name {
            self.name = name;
        }
        if let Some(email) = changes.email {
            self.email = email;
        }
        if let Some(cpf) = changes.cpf {
            self.cpf = cpf;
        }
        if let Some(password) = changes.password {
            self.password = password;
        }
        self.updated_at = now;
    }

    pub fn has_active_session(&self) -> bool {
        self.refresh_token_hash.is_some()
    }
}
