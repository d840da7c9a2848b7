//! 聊天服务入口
//!
//! 加载配置、连接存储、启动过期消息清理任务，然后启动 Axum 服务。

use std::sync::Arc;

use anyhow::Context;
use application::SystemClock;
use config::AppConfig;
use tracing_subscriber::EnvFilter;
use web_api::{assemble, Stores};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::info!(environment = ?config.environment, "configuration loaded");

    let stores = Stores::from_config(&config)
        .await
        .context("failed to initialise storage")?;
    let app = assemble(&config, stores, Arc::new(SystemClock));

    let reaper = app.reaper.clone().spawn();

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    tracing::info!(%address, "chat server listening");

    axum::serve(listener, app.router())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reaper.abort();
    tracing::info!("chat server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
