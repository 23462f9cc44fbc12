//! HTTP server setup and management

use std::future::Future;
use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use super::handlers::{cors, health, not_found, status_page, StatusService};

pub fn router(service: StatusService) -> Router {
    Router::new()
        .route("/", get(status_page))
        .route("/status", get(status_page))
        .route("/health", get(health))
        .route("/api/status", get(health))
        .fallback(not_found)
        .layer(middleware::from_fn(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Serve until `shutdown` resolves, then let in-flight responses finish
pub async fn start<F>(listener: TcpListener, service: StatusService, shutdown: F) -> crate::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(service);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
