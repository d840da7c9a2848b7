//! 双令牌认证：签发、校验、轮换与吊销。

pub mod guard;
pub mod issuer;
pub mod strategy;
pub mod token;

pub use guard::{AuthGuard, CallContext, RequestCredentials};
pub use issuer::{TokenIssuer, TokenPair};
pub use strategy::{AuthStrategy, TokenValidator};
pub use token::{Claims, TokenCodec, TokenError, TokenKind};
