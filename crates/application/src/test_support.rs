//! 单元测试共用的装配：内存存储、手动时钟和可预测的哈希器。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use config::JwtConfig;
use domain::{
    Cpf, Message, MessageAuthor, MessageContent, MessageId, PasswordHash, PersonName,
    RefreshTokenHash, RoomId, Timestamp, User, UserEmail, UserId,
};

use crate::auth::{AuthGuard, TokenCodec, TokenIssuer, TokenValidator};
use crate::clock::{Clock, ManualClock};
use crate::connection::ConnectionAuthenticator;
use crate::dto::RegisterInput;
use crate::local_broadcast::LocalMessageBroadcaster;
use crate::memory::{MemoryMessageRepository, MemoryUserRepository};
use crate::password::{PasswordHasher, PasswordHasherError, TokenHasher};
use crate::repository::UserRepository;
use crate::rooms::RoomRegistry;
use crate::services::{
    AuthService, AuthServiceDependencies, ChatService, ChatServiceDependencies, UserService,
    UserServiceDependencies,
};

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        access_secret: "test-access-secret".into(),
        refresh_secret: "test-refresh-secret".into(),
        access_ttl_secs: 900,
        refresh_ttl_secs: 7 * 24 * 3600,
    }
}

pub struct PlainTokenHasher;

impl TokenHasher for PlainTokenHasher {
    fn digest(&self, token: &str) -> RefreshTokenHash {
        RefreshTokenHash::new(format!("digest:{token}")).unwrap()
    }
}

pub struct PlainPasswordHasher;

#[async_trait]
impl PasswordHasher for PlainPasswordHasher {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError> {
        PasswordHash::new(format!("plain:{plaintext}"))
            .map_err(|err| PasswordHasherError::hash_error(err.to_string()))
    }

    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError> {
        Ok(hashed.as_str() == format!("plain:{plaintext}"))
    }
}

pub fn user(name: &str, email: &str, cpf: &str) -> User {
    User::register(
        UserId::generate(),
        PersonName::parse(name).unwrap(),
        UserEmail::parse(email).unwrap(),
        Cpf::parse(cpf).unwrap(),
        PasswordHash::new("plain:secret1").unwrap(),
        chrono::Utc::now(),
    )
}

pub fn message_in(room: &str, content: &str, created_at: Timestamp) -> Message {
    let author = user("Alice", "alice@x.com", "12345678901");
    Message::post(
        MessageId::generate(),
        RoomId::parse(room).unwrap(),
        MessageContent::new(content).unwrap(),
        MessageAuthor::from(&author),
        created_at,
        Duration::minutes(5),
    )
}

pub fn register_input(name: &str, email: &str, cpf: &str) -> RegisterInput {
    RegisterInput {
        name: name.into(),
        email: email.into(),
        cpf: cpf.into(),
        password: "secret1".into(),
    }
}

pub struct Harness {
    pub users: Arc<MemoryUserRepository>,
    pub messages: Arc<MemoryMessageRepository>,
    pub codec: Arc<TokenCodec>,
    pub hasher: Arc<PlainTokenHasher>,
    pub clock: Arc<ManualClock>,
    pub broker: Arc<LocalMessageBroadcaster>,
    pub issuer: Arc<TokenIssuer>,
    pub validator: Arc<TokenValidator>,
    pub guard: AuthGuard,
    pub connections: ConnectionAuthenticator,
    pub user_service: Arc<UserService>,
    pub auth_service: AuthService,
    pub chat_service: ChatService,
}

impl Harness {
    pub fn new() -> Self {
        let users = Arc::new(MemoryUserRepository::new());
        let messages = Arc::new(MemoryMessageRepository::new());
        let codec = Arc::new(TokenCodec::new(&jwt_config()));
        let hasher = Arc::new(PlainTokenHasher);
        let clock = Arc::new(ManualClock::default());
        let broker = Arc::new(LocalMessageBroadcaster::new(16));

        let issuer = Arc::new(TokenIssuer::new(
            codec.clone(),
            users.clone(),
            hasher.clone(),
            clock.clone(),
        ));
        let validator = Arc::new(TokenValidator::new(
            codec.clone(),
            users.clone(),
            hasher.clone(),
        ));
        let guard = AuthGuard::new(validator.clone());
        let connections = ConnectionAuthenticator::new(validator.clone(), "refreshToken");

        let user_service = Arc::new(UserService::new(UserServiceDependencies {
            user_repository: users.clone(),
            password_hasher: Arc::new(PlainPasswordHasher),
            clock: clock.clone(),
        }));
        let auth_service = AuthService::new(AuthServiceDependencies {
            user_service: user_service.clone(),
            token_issuer: issuer.clone(),
            token_hasher: hasher.clone(),
        });
        let chat_service = ChatService::new(ChatServiceDependencies {
            message_repository: messages.clone(),
            broadcaster: broker.clone(),
            rooms: Arc::new(RoomRegistry::new(["general", "random", "tech"])),
            clock: clock.clone(),
            message_ttl: Duration::minutes(5),
        });

        Self {
            users,
            messages,
            codec,
            hasher,
            clock,
            broker,
            issuer,
            validator,
            guard,
            connections,
            user_service,
            auth_service,
            chat_service,
        }
    }

    /// 直接写入仓储的测试用户，密码为 `secret1`
    pub async fn alice(&self) -> User {
        let mut alice = user("Alice", "alice@x.com", "12345678901");
        alice.created_at = self.clock.now();
        alice.updated_at = alice.created_at;
        self.users.create(alice).await.unwrap()
    }

    pub async fn stored(&self, id: UserId) -> User {
        self.users.find_by_id(id).await.unwrap().unwrap()
    }
}
