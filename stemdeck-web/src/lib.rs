//! stemdeck-web library interface
//!
//! Upload, separate, remix and export. Exposes the router and state so the
//! binary and the integration tests build the service the same way.

pub mod api;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use stemdeck_common::config::ServiceConfig;
use stemdeck_common::StorageLayout;

use crate::services::{Separator, Transcoder};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Resolved configuration (immutable after startup)
    pub config: Arc<ServiceConfig>,
    /// Directory conventions under the root folder
    pub layout: Arc<StorageLayout>,
    /// FFmpeg adapter
    pub transcoder: Transcoder,
    /// Demucs adapter
    pub separator: Separator,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last external-tool failure, for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> Self {
        let layout = StorageLayout::new(&config.root_folder);
        let transcoder = Transcoder::new(
            config.ffmpeg_path.clone(),
            config.export_audio_bitrate.clone(),
            config.normalize_single_track,
        );
        let separator = Separator::from_config(&config);

        Self {
            config: Arc::new(config),
            layout: Arc::new(layout),
            transcoder,
            separator,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember `error` for `/health`
    pub async fn record_error(&self, error: &ApiError) {
        *self.last_error.write().await = Some(error.to_string());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // HTML pages and browser scripts
        .merge(api::ui_routes())
        // Upload / process / export
        .merge(api::job_routes(&state.config))
        .merge(api::static_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
