//! 基础设施层实现。
//!
//! 提供 Postgres 仓储、密码与刷新令牌哈希等适配器，实现应用层定义的接口。

pub mod builder;
pub mod hashing;
pub mod migrations;
pub mod repository;

pub use builder::{Infrastructure, InfrastructureConfig, InfrastructureError};
pub use hashing::{BcryptPasswordHasher, Sha256TokenHasher};
pub use migrations::MIGRATOR;
pub use repository::{create_pg_pool, PgMessageRepository, PgStorage, PgUserRepository};
