//! Coin Arena Server - authoritative multiplayer game server
//!
//! Entry point. Serves:
//! - the game WebSocket at `/ws`
//! - a health check at `/health`

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use coin_arena::app::AppState;
use coin_arena::config::Config;
use coin_arena::http::build_router;
use coin_arena::util::logging::init_tracing;
use coin_arena::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("invalid configuration")?;

    init_tracing(&config.log_level);
    init_server_time();

    info!("Starting Coin Arena Server");
    info!(
        addr = %config.server_addr,
        latency_ms = config.latency.as_millis() as u64,
        tick_rate = config.world.tick_rate,
        "Configuration loaded"
    );

    let addr = config.server_addr;
    let (state, session) = AppState::new(config);

    // The world session lives for the whole process
    let session_handle = tokio::spawn(session.run());

    let router = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Router (and every handle it held) is gone; let the session wind down
    session_handle.abort();

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
