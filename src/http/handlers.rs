//! HTTP request handlers

use std::sync::Arc;
use std::time::Instant;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use time::format_description::well_known::Rfc3339;
use super::models::HealthResponse;
use crate::refresh::RefreshCoordinator;
use crate::snapshot::SnapshotStore;

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Read-only view over the snapshot and refresh state, shared by all
/// requests. Nothing here triggers or waits for a refresh.
#[derive(Clone)]
pub struct StatusService {
    store: Arc<SnapshotStore>,
    coordinator: Arc<RefreshCoordinator>,
    refresh_interval_minutes: u64,
    started_at: Instant,
}

impl StatusService {
    pub fn new(
        store: Arc<SnapshotStore>,
        coordinator: Arc<RefreshCoordinator>,
        refresh_interval_minutes: u64,
    ) -> Self {
        Self {
            store,
            coordinator,
            refresh_interval_minutes,
            started_at: Instant::now(),
        }
    }

    /// Current dashboard content and its content type
    pub fn status_page(&self) -> (String, &'static str) {
        (self.store.read().content.clone(), HTML_CONTENT_TYPE)
    }

    pub fn health(&self) -> HealthResponse {
        let snapshot = self.store.read();
        HealthResponse {
            ok: true,
            uptime: self.started_at.elapsed().as_secs(),
            last_update: snapshot
                .produced_at
                .and_then(|at| at.format(&Rfc3339).ok()),
            refresh_interval_minutes: self.refresh_interval_minutes,
            is_refreshing: self.coordinator.is_refreshing(),
            last_attempt: self.coordinator.last_result(),
        }
    }
}

/// `GET /` and `GET /status`
pub async fn status_page(State(service): State<StatusService>) -> Response {
    let (content, content_type) = service.status_page();
    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        content,
    )
        .into_response()
}

/// `GET /health` and `GET /api/status`
pub async fn health(State(service): State<StatusService>) -> Json<HealthResponse> {
    Json(service.health())
}

pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}

/// Answers preflights, rejects anything but GET and stamps CORS headers on
/// every response
pub async fn cors(request: Request, next: Next) -> Response {
    let mut response = match *request.method() {
        Method::OPTIONS => StatusCode::OK.into_response(),
        Method::GET => next.run(request).await,
        _ => (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response(),
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}
