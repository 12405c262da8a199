//! myblog - A small personal blog on a hosted backend

use anyhow::Result;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use myblog::{
    api::{self, AppState},
    config::Config,
    remote,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "myblog=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting myblog...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    config.validate()?;
    tracing::info!("Configuration loaded");

    // Connect the hosted backend
    let remote = remote::create_backend(&config.remote)?;
    tracing::info!(driver = ?config.remote.driver, "Backend ready");

    // Build application state (starts the session change pump)
    let state = AppState::build(&config, remote)?;
    tracing::info!(theme_path = %config.theme.path.display(), "Theme engine initialized");

    // Build router
    let app = api::build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
