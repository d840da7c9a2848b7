//! 组合根：按依赖顺序构造所有组件并注入
//!
//! 叶子组件（存储、哈希器、时钟）最先创建，随后是令牌、鉴权、房间、总线和服务。

use std::sync::Arc;

use application::{
    AuthGuard, AuthService, AuthServiceDependencies, ChatService, ChatServiceDependencies, Clock,
    ConnectionAuthenticator, LocalMessageBroadcaster, MemoryMessageRepository,
    MemoryUserRepository, MessageReaper, MessageRepository, PasswordHasher, RoomRegistry,
    TokenCodec, TokenHasher, TokenIssuer, TokenValidator, UserRepository, UserService,
    UserServiceDependencies, ttl_duration,
};
use axum::Router;
use config::AppConfig;
use infrastructure::{
    BcryptPasswordHasher, Infrastructure, InfrastructureConfig, InfrastructureError,
    Sha256TokenHasher,
};

use crate::{
    routes::router,
    state::{AppState, CookieSettings},
};

/// 存储与哈希适配器
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub token_hasher: Arc<dyn TokenHasher>,
}

impl Stores {
    /// 内存存储，进程退出即丢失
    pub fn in_memory(config: &AppConfig) -> Self {
        Self {
            users: Arc::new(MemoryUserRepository::new()),
            messages: Arc::new(MemoryMessageRepository::new()),
            password_hasher: Arc::new(BcryptPasswordHasher::new(config.server.bcrypt_cost)),
            token_hasher: Arc::new(Sha256TokenHasher),
        }
    }

    /// 配置了数据库地址时连接 Postgres 并执行迁移，否则退回内存存储
    pub async fn from_config(config: &AppConfig) -> Result<Self, InfrastructureError> {
        let Some(infra_config) = InfrastructureConfig::from_app(&config.database, &config.server)
        else {
            tracing::warn!("no database configured, using in-memory stores");
            return Ok(Self::in_memory(config));
        };

        let infrastructure = Infrastructure::connect(infra_config).await?;
        Ok(Self {
            users: infrastructure.storage.user_repository.clone(),
            messages: infrastructure.storage.message_repository.clone(),
            password_hasher: infrastructure.password_hasher.clone(),
            token_hasher: infrastructure.token_hasher.clone(),
        })
    }
}

/// 装配完成的应用
pub struct Application {
    pub state: AppState,
    pub reaper: Arc<MessageReaper>,
    pub broker: Arc<LocalMessageBroadcaster>,
    cors_origins: Vec<String>,
}

impl Application {
    pub fn router(&self) -> Router {
        router(self.state.clone(), &self.cors_origins)
    }
}

pub fn assemble(config: &AppConfig, stores: Stores, clock: Arc<dyn Clock>) -> Application {
    let Stores {
        users,
        messages,
        password_hasher,
        token_hasher,
    } = stores;

    let codec = Arc::new(TokenCodec::new(&config.jwt));
    let issuer = Arc::new(TokenIssuer::new(
        codec.clone(),
        users.clone(),
        token_hasher.clone(),
        clock.clone(),
    ));
    let validator = Arc::new(TokenValidator::new(
        codec,
        users.clone(),
        token_hasher.clone(),
    ));
    let guard = Arc::new(AuthGuard::new(validator.clone()));
    let connections = Arc::new(ConnectionAuthenticator::new(
        validator,
        config.cookie.name.clone(),
    ));

    let rooms = Arc::new(RoomRegistry::new(config.chat.rooms.iter().cloned()));
    let broker = Arc::new(LocalMessageBroadcaster::new(config.broadcast.capacity));

    let user_service = Arc::new(UserService::new(UserServiceDependencies {
        user_repository: users,
        password_hasher,
        clock: clock.clone(),
    }));
    let auth_service = Arc::new(AuthService::new(AuthServiceDependencies {
        user_service: user_service.clone(),
        token_issuer: issuer,
        token_hasher,
    }));
    let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
        message_repository: messages.clone(),
        broadcaster: broker.clone(),
        rooms,
        clock: clock.clone(),
        message_ttl: ttl_duration(config.chat.message_ttl()),
    }));
    let reaper = Arc::new(MessageReaper::new(
        messages,
        clock,
        config.chat.reaper_interval(),
    ));

    let state = AppState {
        environment: config.environment,
        user_service,
        auth_service,
        chat_service,
        guard,
        connections,
        cookies: CookieSettings::from_config(&config.cookie, config.environment),
    };

    Application {
        state,
        reaper,
        broker,
        cors_origins: config.server.cors_origins.clone(),
    }
}
