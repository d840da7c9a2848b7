use std::sync::Arc;

use config::{DatabaseConfig, ServerConfig};
use thiserror::Error;

use crate::{
    hashing::{BcryptPasswordHasher, Sha256TokenHasher},
    migrations::MIGRATOR,
    repository::{create_pg_pool, PgStorage},
};

#[derive(Debug, Clone)]
pub struct InfrastructureConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub bcrypt_cost: Option<u32>,
}

impl InfrastructureConfig {
    /// 未配置数据库地址时返回 `None`
    pub fn from_app(database: &DatabaseConfig, server: &ServerConfig) -> Option<Self> {
        database.url.as_ref().map(|url| Self {
            database_url: url.clone(),
            max_connections: database.max_connections,
            bcrypt_cost: server.bcrypt_cost,
        })
    }
}

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

#[derive(Clone)]
pub struct Infrastructure {
    pub storage: Arc<PgStorage>,
    pub password_hasher: Arc<BcryptPasswordHasher>,
    pub token_hasher: Arc<Sha256TokenHasher>,
}

impl Infrastructure {
    /// 连接数据库并执行迁移
    pub async fn connect(config: InfrastructureConfig) -> Result<Self, InfrastructureError> {
        let pool = create_pg_pool(&config.database_url, config.max_connections).await?;
        MIGRATOR.run(&pool).await?;
        tracing::info!(max_connections = config.max_connections, "database migrations applied");

        Ok(Self {
            storage: Arc::new(PgStorage::new(pool)),
            password_hasher: Arc::new(BcryptPasswordHasher::new(config.bcrypt_cost)),
            token_hasher: Arc::new(Sha256TokenHasher),
        })
    }
}
