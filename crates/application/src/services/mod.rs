mod auth_service;
mod chat_service;
mod user_service;

pub use auth_service::{AuthService, AuthServiceDependencies};
pub use chat_service::{ChatService, ChatServiceDependencies};
pub use user_service::{UserService, UserServiceDependencies};
