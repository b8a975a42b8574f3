//! GET /static/*path
//!
//! Serves files under the public asset root. The decoded path is checked
//! before anything touches the filesystem; accepted requests are handed to
//! `ServeDir`.

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::Uri,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::warn;

use stemdeck_common::storage::validate_relative_path;

use crate::error::ApiError;
use crate::AppState;

const STATIC_ROUTE_PREFIX: &str = "/static";

fn invalid_path() -> Response {
    ApiError::BadRequest("Invalid file path".to_string()).into_response()
}

/// GET /static/*path
pub async fn serve_static(
    State(state): State<AppState>,
    Path(path): Path<String>,
    mut request: Request,
) -> Response {
    if let Err(e) = validate_relative_path(&path) {
        warn!(path = %path, error = %e, "Rejected static file request");
        return invalid_path();
    }

    // ServeDir resolves the URI path against its own root
    let remainder = request
        .uri()
        .path()
        .strip_prefix(STATIC_ROUTE_PREFIX)
        .unwrap_or("/")
        .to_string();
    match remainder.parse::<Uri>() {
        Ok(uri) => *request.uri_mut() = uri,
        Err(_) => return invalid_path(),
    }

    match ServeDir::new(&state.layout.public_root).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

/// Build static file routes
pub fn static_routes() -> Router<AppState> {
    Router::new().route("/static/*path", get(serve_static))
}
