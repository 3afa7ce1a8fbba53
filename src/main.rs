use anyhow::Context;
use tokio::net::TcpListener;

use citeline_backend::core::config::AppConfig;
use citeline_backend::state::AppState;
use citeline_backend::{logging, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    logging::init(&config.storage.log_dir);

    let bind_addr = format!("127.0.0.1:{}", config.server.port);
    let state = AppState::initialize(config)
        .await
        .context("Failed to initialize application state")?;

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    let app = server::router::router(state);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
