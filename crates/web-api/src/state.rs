use std::sync::Arc;

use application::{AuthGuard, AuthService, ChatService, ConnectionAuthenticator, UserService};
use config::{CookieConfig, Environment};

/// 刷新令牌 Cookie 的属性
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub path: String,
    pub max_age_secs: u64,
    /// 开发环境之外一律标记为 Secure
    pub secure: bool,
}

impl CookieSettings {
    pub fn from_config(config: &CookieConfig, environment: Environment) -> Self {
        Self {
            name: config.name.clone(),
            path: config.path.clone(),
            max_age_secs: config.max_age_secs,
            secure: environment.is_production(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub environment: Environment,
    pub user_service: Arc<UserService>,
    pub auth_service: Arc<AuthService>,
    pub chat_service: Arc<ChatService>,
    pub guard: Arc<AuthGuard>,
    pub connections: Arc<ConnectionAuthenticator>,
    pub cookies: CookieSettings,
}
