//! Web API 层。
//!
//! 提供 Axum 路由、鉴权中间件和 WebSocket 协议，将请求委托给应用层的用例服务。

mod auth;
pub mod bootstrap;
mod error;
mod routes;
mod state;
mod websocket;
mod ws_connection;

pub use auth::{CurrentUser, PresentedRefreshToken};
pub use bootstrap::{assemble, Application, Stores};
pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, CookieSettings};
pub use websocket::{ClientFrame, ServerFrame};
