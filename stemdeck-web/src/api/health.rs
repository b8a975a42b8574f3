//! GET /health
//!
//! Reports `degraded` once an external tool has failed; the failure text is
//! kept until the next one replaces it.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` after a recorded tool failure
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    /// Separation model every job runs with
    pub model: String,
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl HealthResponse {
    async fn snapshot(state: &AppState) -> Self {
        let last_error = state.last_error.read().await.clone();
        let uptime_seconds = (Utc::now() - state.startup_time)
            .to_std()
            .map(|d| d.as_secs())
            .unwrap_or_default();

        Self {
            status: if last_error.is_some() { "degraded" } else { "ok" },
            module: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            model: state.separator.model().to_string(),
            uptime_seconds,
            last_error,
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::snapshot(&state).await)
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
