//! 统一配置中心
//!
//! 提供应用的全局配置管理，包括：
//! - 运行环境
//! - 数据库连接
//! - 双令牌认证与刷新 Cookie
//! - 聊天室与消息过期策略
//!
//! 加载顺序：内置默认值 -> `APP_CONFIG_FILE` 指定的 YAML 文件 -> `APP_` 前缀环境变量
//! （嵌套字段使用 `__` 分隔，例如 `APP_JWT__ACCESS_SECRET`）。

use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// 指定配置文件路径的环境变量
pub const CONFIG_FILE_ENV: &str = "APP_CONFIG_FILE";

/// 令牌、消息和清理周期等时长配置的上限（十年）
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// 运行环境
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// 全局应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub environment: Environment,
    /// 服务配置
    pub server: ServerConfig,
    /// 数据库配置，未设置 URL 时使用内存存储
    pub database: DatabaseConfig,
    /// JWT认证配置
    pub jwt: JwtConfig,
    /// 刷新令牌 Cookie 配置
    pub cookie: CookieConfig,
    /// 聊天室配置
    pub chat: ChatConfig,
    /// 广播器配置
    pub broadcast: BroadcastConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    pub bcrypt_cost: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_origins: vec!["http://localhost:3000".to_string()],
            bcrypt_cost: None,
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

/// JWT配置：访问令牌与刷新令牌使用不同的密钥和有效期
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
}

impl JwtConfig {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            access_secret: "dev-access-secret-not-for-production-use".to_string(),
            refresh_secret: "dev-refresh-secret-not-for-production-use".to_string(),
            access_ttl_secs: 15 * 60,
            refresh_ttl_secs: 7 * 24 * 60 * 60,
        }
    }
}

/// 刷新令牌 Cookie 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    pub name: String,
    pub path: String,
    pub max_age_secs: u64,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "refreshToken".to_string(),
            path: "/".to_string(),
            max_age_secs: 7 * 24 * 60 * 60,
        }
    }
}

/// 聊天室配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// 固定的房间列表，按声明顺序对外展示
    pub rooms: Vec<String>,
    pub message_ttl_secs: u64,
    pub reaper_interval_secs: u64,
}

impl ChatConfig {
    pub fn message_ttl(&self) -> Duration {
        Duration::from_secs(self.message_ttl_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            rooms: vec![
                "general".to_string(),
                "random".to_string(),
                "tech".to_string(),
            ],
            message_ttl_secs: 5 * 60,
            reaper_interval_secs: 5 * 60,
        }
    }
}

/// 广播器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// 每个订阅者允许积压的消息数，超过后强制断开
    pub capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl AppConfig {
    /// 组装分层配置源
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed("APP_").split("__"))
    }

    /// 从默认配置源加载并校验
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment
            .extract()
            .map_err(|err| ConfigError::Load(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 验证配置有效性
    /// 生产环境额外要求强密钥和数据库连接
    pub fn validate(&self) -> Result<(), ConfigError> {
        let jwt = &self.jwt;
        if jwt.access_secret.is_empty() || jwt.refresh_secret.is_empty() {
            return Err(ConfigError::InvalidJwtSecret(
                "JWT secrets cannot be empty".to_string(),
            ));
        }
        if jwt.access_secret == jwt.refresh_secret {
            return Err(ConfigError::InvalidJwtSecret(
                "access and refresh secrets must differ".to_string(),
            ));
        }
        if jwt.access_ttl_secs == 0 || jwt.refresh_ttl_secs == 0 {
            return Err(ConfigError::InvalidJwtSecret(
                "token lifetimes must be greater than 0".to_string(),
            ));
        }
        if jwt.access_ttl_secs > MAX_TTL_SECS || jwt.refresh_ttl_secs > MAX_TTL_SECS {
            return Err(ConfigError::InvalidJwtSecret(format!(
                "token lifetimes must not exceed {MAX_TTL_SECS} seconds"
            )));
        }

        if self.environment.is_production() {
            for secret in [&jwt.access_secret, &jwt.refresh_secret] {
                // 至少256位/32字节
                if secret.len() < 32 {
                    return Err(ConfigError::InvalidJwtSecret(
                        "JWT secret must be at least 32 characters long".to_string(),
                    ));
                }
                if secret.contains("dev-") || secret.contains("not-for-production") {
                    return Err(ConfigError::InvalidJwtSecret(
                        "Cannot use development JWT secret in production".to_string(),
                    ));
                }
            }
            if self.database.url.is_none() {
                return Err(ConfigError::InvalidDatabaseConfig(
                    "database url is required in production".to_string(),
                ));
            }
        }

        if matches!(&self.database.url, Some(url) if url.trim().is_empty()) {
            return Err(ConfigError::InvalidDatabaseConfig(
                "Database URL cannot be empty".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidDatabaseConfig(
                "Max connections must be greater than 0".to_string(),
            ));
        }

        if self.cookie.name.trim().is_empty() || !self.cookie.path.starts_with('/') {
            return Err(ConfigError::InvalidCookieConfig(
                "cookie name must be set and path must start with '/'".to_string(),
            ));
        }

        if self.chat.rooms.iter().all(|room| room.trim().is_empty()) {
            return Err(ConfigError::InvalidChatConfig(
                "at least one room is required".to_string(),
            ));
        }
        if self.chat.message_ttl_secs == 0 || self.chat.reaper_interval_secs == 0 {
            return Err(ConfigError::InvalidChatConfig(
                "message ttl and reaper interval must be greater than 0".to_string(),
            ));
        }
        if self.chat.message_ttl_secs > MAX_TTL_SECS
            || self.chat.reaper_interval_secs > MAX_TTL_SECS
        {
            return Err(ConfigError::InvalidChatConfig(format!(
                "message ttl and reaper interval must not exceed {MAX_TTL_SECS} seconds"
            )));
        }
        if self.broadcast.capacity == 0 {
            return Err(ConfigError::InvalidChatConfig(
                "broadcast capacity must be greater than 0".to_string(),
            ));
        }

        if let Some(cost) = self.server.bcrypt_cost {
            let allowed = if self.environment.is_production() {
                10..=14
            } else {
                4..=31
            };
            if !allowed.contains(&cost) {
                return Err(ConfigError::InvalidServerConfig(format!(
                    "bcrypt cost should be between {}-{}",
                    allowed.start(),
                    allowed.end()
                )));
            }
        }

        Ok(())
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),
    #[error("Invalid JWT secret: {0}")]
    InvalidJwtSecret(String),
    #[error("Invalid database configuration: {0}")]
    InvalidDatabaseConfig(String),
    #[error("Invalid cookie configuration: {0}")]
    InvalidCookieConfig(String),
    #[error("Invalid chat configuration: {0}")]
    InvalidChatConfig(String),
    #[error("Invalid server configuration: {0}")]
    InvalidServerConfig(String),
}
