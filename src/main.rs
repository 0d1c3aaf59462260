use anyhow::Result;
use tokio::net::TcpListener;

use chat_broadcaster::config::Settings;
use chat_broadcaster::server::{create_app, AppState};
use chat_broadcaster::shutdown::{shutdown_signal, GracefulShutdown};
use chat_broadcaster::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    init_tracing(&settings.log);
    tracing::info!(chat_path = %settings.chat.path, "Configuration loaded");

    // Create application state
    let state = AppState::new(settings.clone())?;
    let shutdown = GracefulShutdown::new(state.hub.clone());

    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.execute().await;
        })
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}
