//! POST /export
//!
//! Mixes the selected stems with per-track gain and muxes the result onto
//! the video stream of the uploaded clip.
//!
//! The body is read as raw bytes so that a wrong content type or malformed
//! JSON produce the same 400 `{error}` shape as every other rejection.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use stemdeck_common::time;

use crate::error::{export_failed, ApiError, ApiResult};
use crate::models::VolumeSetting;
use crate::services::MixTrack;
use crate::AppState;

const REQUIRED_FIELDS: [&str; 2] = ["video_url", "tracks"];

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub success: bool,
    pub download_url: String,
    pub file_size: u64,
}

/// True for `application/json`, with or without parameters
fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// POST /export
pub async fn export_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<ExportResponse>> {
    if !is_json_content_type(&headers) {
        return Err(ApiError::BadRequest(
            "Content-Type must be application/json".to_string(),
        ));
    }

    let data: Value = serde_json::from_slice(&body).map_err(|e| ApiError::BadRequestDetails {
        error: "Invalid JSON data".to_string(),
        details: e.to_string(),
    })?;
    debug!(request = %data, "Export request");

    for field in REQUIRED_FIELDS {
        if data.get(field).is_none() {
            return Err(ApiError::BadRequest(format!("Missing required field: {}", field)));
        }
    }

    let result = run_export(&state, &data).await;
    if let Err(e) = &result {
        if e.status().is_server_error() {
            state.record_error(e).await;
        }
    }
    result.map(Json)
}

async fn run_export(state: &AppState, data: &Value) -> ApiResult<ExportResponse> {
    let video_path = resolve_video(state, &data["video_url"])?;

    let empty = Map::new();
    let track_urls = data["tracks"].as_object().unwrap_or_else(|| {
        warn!(tracks = %data["tracks"], "Tracks is not an object");
        &empty
    });
    let volumes = data.get("volumes").and_then(Value::as_object);

    let tracks = collect_tracks(state, track_urls, volumes);
    if tracks.is_empty() {
        return Err(ApiError::BadRequest("No valid audio tracks found".to_string()));
    }

    tokio::fs::create_dir_all(&state.layout.exports).await?;
    let output_name = format!("export_{}.mp4", time::now_token());
    let output_path = state.layout.export_path(&output_name);

    info!(
        video = %video_path.display(),
        tracks = tracks.len(),
        output = %output_path.display(),
        "Starting export"
    );
    state
        .transcoder
        .mux_mix(&video_path, &tracks, &output_path)
        .await
        .map_err(export_failed)?;

    let metadata = match tokio::fs::metadata(&output_path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => {
            return Err(ApiError::Internal(
                "Export failed - output file not created".to_string(),
            ))
        }
    };

    let download_url = state.layout.public_url(&output_path).ok_or_else(|| {
        ApiError::Internal(format!("Export stored outside public root: {}", output_path.display()))
    })?;

    info!(download_url = %download_url, file_size = metadata.len(), "Export completed");

    Ok(ExportResponse {
        success: true,
        download_url,
        file_size: metadata.len(),
    })
}

fn resolve_video(state: &AppState, value: &Value) -> ApiResult<PathBuf> {
    let invalid = || ApiError::BadRequest("Invalid video URL format".to_string());

    let url = value.as_str().ok_or_else(invalid)?;
    let path = state.layout.resolve_public_url(url).map_err(|e| {
        warn!(video_url = %url, error = %e, "Rejected video URL");
        invalid()
    })?;

    if !path.is_file() {
        return Err(ApiError::NotFound("Video file not found".to_string()));
    }
    Ok(path)
}

/// Validate every track entry; invalid ones are logged and dropped
fn collect_tracks(
    state: &AppState,
    track_urls: &Map<String, Value>,
    volumes: Option<&Map<String, Value>>,
) -> Vec<MixTrack> {
    let origin = state.config.local_origin.as_str();
    let mut tracks = Vec::with_capacity(track_urls.len());

    for (name, value) in track_urls {
        let Some(raw) = value.as_str() else {
            warn!(track = %name, value = %value, "Track URL is not a string");
            continue;
        };
        let url = if origin.is_empty() {
            raw
        } else {
            raw.strip_prefix(origin).unwrap_or(raw)
        };

        let path = match state.layout.resolve_public_url(url) {
            Ok(path) => path,
            Err(e) => {
                warn!(track = %name, url = %raw, error = %e, "Invalid track URL");
                continue;
            }
        };
        if !path.is_file() {
            warn!(track = %name, path = %path.display(), "Track file not found");
            continue;
        }

        let setting = VolumeSetting::parse(volumes.and_then(|v| v.get(name)));
        if let VolumeSetting::Fallback(rejected) = &setting {
            warn!(track = %name, value = %rejected, "Invalid volume, using default");
        }
        let volume = setting.gain();
        debug!(track = %name, volume, "Track accepted");

        tracks.push(MixTrack {
            name: name.clone(),
            path,
            volume,
        });
    }

    tracks
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn test_json_content_type() {
        assert!(is_json_content_type(&headers("application/json")));
        assert!(is_json_content_type(&headers("application/json; charset=utf-8")));
        assert!(is_json_content_type(&headers("Application/JSON")));
        assert!(!is_json_content_type(&headers("text/plain")));
        assert!(!is_json_content_type(&HeaderMap::new()));
    }
}
