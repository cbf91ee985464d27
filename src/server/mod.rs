//! HTTP job API
//!
//! Submit / poll / fetch over an Axum router, plus the `serve` entry point
//! that wires the service, the periodic retention sweep and graceful shutdown.

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ErrorResponse};
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::retention;
use crate::segmentation::Segmenter;
use crate::service::BackgroundRemovalService;

/// Create the Axum application with all routes and middleware.
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until Ctrl-C.
///
/// # Errors
/// - Service construction failures (invalid config, temp dir not creatable)
/// - Bind or accept failures
pub async fn serve(config: ServiceConfig, segmenter: Arc<dyn Segmenter>) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let service = BackgroundRemovalService::new(config, segmenter)?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let config = service.config();
    let sweeper = retention::spawn_periodic(
        config.temp_dir.clone(),
        config.retention_max_age,
        config.sweep_interval,
    );
    let app = create_app(AppState::new(service));
    tracing::info!(address = %addr, "Server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    sweeper.abort();
    served?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
