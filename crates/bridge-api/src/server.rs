//! HTTP server setup and configuration

use std::net::SocketAddr;

use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::routes::create_router;
use crate::AppState;

/// Bridging and health routes with request tracing and CORS open to any origin
pub fn create_app(state: AppState) -> Router {
    let bridging_cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(bridging_cors)
}

/// Serve on all interfaces until the root cancellation token fires
pub async fn start_server(state: AppState, port: u16) -> Result<(), std::io::Error> {
    let shutdown = state.cancel_token().clone();
    let app = create_app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}
