//! POST /process
//!
//! Prepares the separation input (video uploads are copied to a pristine
//! `original_<name>` and their audio extracted to WAV), runs the separator
//! into a fresh per-job directory and reports the stems it produced.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

use stemdeck_common::storage::{extension_of, file_stem, is_plain_filename, list_dir};

use crate::error::{video_processing_failed, ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub job_id: Uuid,
    /// Stem name → public URL
    pub tracks: BTreeMap<String, String>,
    pub video_url: String,
}

/// Separation input plus the URL the results page should play
struct PreparedInput {
    input: PathBuf,
    video_url: String,
}

/// POST /process
pub async fn process_file(
    State(state): State<AppState>,
    request: Result<Json<ProcessRequest>, JsonRejection>,
) -> ApiResult<Json<ProcessResponse>> {
    let Json(request) = request.map_err(|e| {
        warn!(error = %e, "Rejected process request body");
        ApiError::BadRequest("Invalid request data".to_string())
    })?;

    let filename = request.filename;
    if filename.is_empty() {
        return Err(ApiError::BadRequest("Invalid request data".to_string()));
    }
    // A single path segment; names like `my..song.mp3` are valid uploads
    if !is_plain_filename(&filename) {
        return Err(ApiError::BadRequest("Invalid filename".to_string()));
    }

    let result = run_job(&state, &filename).await;
    if let Err(e) = &result {
        if e.status().is_server_error() {
            state.record_error(e).await;
        }
    }
    result.map(Json)
}

async fn run_job(state: &AppState, filename: &str) -> ApiResult<ProcessResponse> {
    let path = state.layout.upload_path(filename);
    if !path.is_file() {
        return Err(ApiError::NotFound(format!("File not found at {}", path.display())));
    }

    let prepared = prepare_input(state, filename, path).await?;

    let job_id = Uuid::new_v4();
    let output_base = state.layout.job_dir(&job_id);
    info!(
        job_id = %job_id,
        input = %prepared.input.display(),
        model = %state.separator.model(),
        "Starting separation"
    );

    let output = state.separator.separate(&prepared.input, &output_base).await?;

    if output.stems.is_empty() {
        return Err(ApiError::NoStems {
            command: output.command,
            output_folder: output_base.display().to_string(),
            content: list_dir(&output_base),
        });
    }

    let layout = &state.layout;
    let tracks = output.stems.to_urls(|path| layout.public_url(path));
    info!(job_id = %job_id, stems = ?tracks.keys().collect::<Vec<_>>(), "Processing completed");

    Ok(ProcessResponse {
        success: true,
        job_id,
        tracks,
        video_url: prepared.video_url,
    })
}

async fn prepare_input(state: &AppState, filename: &str, path: PathBuf) -> ApiResult<PreparedInput> {
    let extension = extension_of(filename).unwrap_or_default();

    if !state.config.is_video_extension(&extension) {
        let video_url = public_url(state, &path)?;
        return Ok(PreparedInput {
            input: path,
            video_url,
        });
    }

    let original = state.layout.upload_path(&format!("original_{}", filename));
    info!(source = %path.display(), copy = %original.display(), "Preserving original video");
    state
        .transcoder
        .copy_streams(&path, &original)
        .await
        .map_err(video_processing_failed)?;

    let wav = state.layout.upload_path(&format!("{}.wav", file_stem(filename)));
    info!(source = %path.display(), wav = %wav.display(), "Extracting audio");
    state
        .transcoder
        .extract_wav(&path, &wav)
        .await
        .map_err(video_processing_failed)?;

    Ok(PreparedInput {
        input: wav,
        video_url: public_url(state, &original)?,
    })
}

fn public_url(state: &AppState, path: &std::path::Path) -> ApiResult<String> {
    state
        .layout
        .public_url(path)
        .ok_or_else(|| ApiError::Internal(format!("Not under the public root: {}", path.display())))
}
