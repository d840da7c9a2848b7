//! 聊天系统核心领域模型
//!
//! 包含用户身份、聊天消息等核心实体，以及相关的值对象和错误类型。

pub mod errors;
pub mod message;
pub mod user;
pub mod value_objects;

// 重新导出常用类型
pub use errors::*;
pub use message::*;
pub use user::*;
pub use value_objects::*;
