use std::net::SocketAddr;

use anyhow::Context;
use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;
use tracing::info;

use pixelgate::{
    Config,
    handlers::{health_check, status},
    initialize,
};

const DEFAULT_PORT: u16 = 3000;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();

    let config = Config::load().context("Failed to load configuration")?;

    let port = u16::try_from(config.get_int("server.port"))
        .ok()
        .filter(|p| *p != 0)
        .unwrap_or(DEFAULT_PORT);

    // A failed step aborts startup; the partial state is dropped here.
    let app_state = initialize(&config).await.context("Startup aborted")?;

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
