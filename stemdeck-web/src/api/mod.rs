//! HTTP handlers for stemdeck-web

pub mod export;
pub mod health;
pub mod process;
pub mod static_files;
pub mod ui;
pub mod upload;

pub use health::health_routes;
pub use static_files::static_routes;
pub use ui::ui_routes;

use axum::{extract::DefaultBodyLimit, routing::post, Router};

use stemdeck_common::config::ServiceConfig;

use crate::AppState;

/// Upload, process and export routes
///
/// Only `/upload` carries the configured body limit; the JSON routes keep
/// the framework default.
pub fn job_routes(config: &ServiceConfig) -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(upload::upload_file).layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        )
        .route("/process", post(process::process_file))
        .route("/export", post(export::export_video))
}
