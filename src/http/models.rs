//! HTTP API response models

use serde::Serialize;
use crate::refresh::AttemptResult;

/// Health/refresh metadata, derived on every request and never stored
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub ok: bool,
    /// Process uptime in seconds
    pub uptime: u64,
    /// RFC 3339 time of the last successful refresh
    pub last_update: Option<String>,
    pub refresh_interval_minutes: u64,
    pub is_refreshing: bool,
    pub last_attempt: AttemptResult,
}
