//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务：双令牌认证、长连接握手认证、
//! 房间消息的存储与广播，以及对外部适配器（密码哈希、存储、时钟）的抽象。

pub mod auth;
pub mod broadcaster;
pub mod clock;
pub mod connection;
pub mod dto;
pub mod error;
pub mod local_broadcast;
pub mod memory;
pub mod password;
pub mod reaper;
pub mod repository;
pub mod rooms;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{
    AuthGuard, AuthStrategy, CallContext, RequestCredentials, TokenCodec, TokenIssuer, TokenPair,
    TokenValidator,
};
pub use broadcaster::{topic_for, BroadcastError, MessageBroadcaster};
pub use clock::{ttl_duration, Clock, ManualClock, SystemClock};
pub use connection::{
    bearer_token, ConnectionAuthenticator, ConnectionContext, CredentialSource, Handshake,
};
pub use dto::{
    AuthSession, CreateMessageInput, LoginInput, MessageDto, RegisterInput, UpdateUserInput,
    UserDto,
};
pub use error::ApplicationError;
pub use local_broadcast::{LocalMessageBroadcaster, MessageStream};
pub use memory::{MemoryMessageRepository, MemoryUserRepository};
pub use password::{PasswordHasher, PasswordHasherError, TokenHasher};
pub use reaper::MessageReaper;
pub use repository::{MessageRepository, UserRepository};
pub use rooms::RoomRegistry;
pub use services::{
    AuthService, AuthServiceDependencies, ChatService, ChatServiceDependencies, UserService,
    UserServiceDependencies,
};
