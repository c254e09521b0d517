//! Canvass - chat-driven survey bot
//!
//! Users author polls through a short dialogue with the bot, which then
//! delivers the question to the chosen recipients and tallies their answers.

mod api;
mod config;
mod db;
mod poll;
mod recipients;
mod router;
mod runtime;
mod slack;
mod state_machine;

use api::{create_router, AppState};
use config::Config;
use db::Database;
use runtime::{DatabaseStorage, Engine, ProductionEngine, WorkerPool};
use slack::SlackApiClient;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canvass=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Config::from_env()?;

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&config.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path, "Opening database");
    let db = Database::open(&config.db_path)?;

    let slack = Arc::new(SlackApiClient::new(
        config.slack_token.clone(),
        &config.slack_api_base,
    )?);

    let bot_user_id = match config.bot_user_id.clone() {
        Some(id) => id,
        None => slack.auth_test().await?,
    };
    tracing::info!(bot_user_id = %bot_user_id, "Connected to Slack");

    if config.signing_secret.is_none() {
        tracing::warn!("SLACK_SIGNING_SECRET not set; inbound requests will not be verified");
    }

    let engine: Arc<ProductionEngine> = Arc::new(Engine::new(
        DatabaseStorage::new(db),
        Arc::clone(&slack),
        slack,
    )?);
    let (pool, queue) = WorkerPool::start(engine, config.workers, config.queue_capacity);
    tracing::info!(
        workers = config.workers,
        capacity = config.queue_capacity,
        "Worker pool started"
    );

    let state = AppState::new(queue, &bot_user_id, config.signing_secret.as_deref());
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Canvass listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
