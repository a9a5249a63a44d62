use std::sync::Arc;

use anyhow::Context;
use parley::{ai::{Gemini, AI_BOT_NAME}, app, auth::{Gate, JwtAuthenticator}, config::Config, db::{Db, Room}, rooms::Chat, AppState};
use tracing_subscriber::EnvFilter;

const SYSTEM_ADMIN: &str = "system";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let db = Db::connect(&config.database_url)
        .await
        .context("connecting to the message store")?;

    let ai_room = Room {
        code: config.ai_room.clone(),
        admin_id: SYSTEM_ADMIN.to_owned(),
        admin_name: AI_BOT_NAME.to_owned(),
    };
    if db.create_room(&ai_room).await? {
        tracing::info!(room = %ai_room.code, "AI room created");
    }

    let responder = Gemini::new(config.gemini_api_key.clone(), config.gemini_model.clone())?;
    if config.gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY not set, the AI room will only answer with its fallback");
    }

    let app_state = AppState {
        chat: Arc::new(Chat::new(db.clone(), Arc::new(responder), config.ai_room.clone())),
        gate: Gate::new(Arc::new(JwtAuthenticator::new(&config.auth_secret)), config.allowed_origin.clone()),
    };
    let app = app(app_state, config.allowed_origin.as_deref())?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, deployment = ?config.deployment, "server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
