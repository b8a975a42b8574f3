//! POST /upload

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use stemdeck_common::storage::extension_of;
use stemdeck_common::time;

use crate::error::{ApiError, ApiResult};
use crate::models::{generated_filename, UploadedAsset};
use crate::AppState;

/// Name of the multipart part carrying the media file
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    pub filepath: String,
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Upload too large".to_string())
    } else {
        warn!(error = %err.body_text(), "Malformed multipart body");
        ApiError::BadRequest("No file uploaded".to_string())
    }
}

/// POST /upload
///
/// Stores the `file` part under the uploads directory with a timestamped,
/// sanitized name. Nothing is written for a rejected request.
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let mut multipart = multipart.map_err(|e| {
        warn!(error = %e, "Upload without a multipart body");
        ApiError::BadRequest("No file uploaded".to_string())
    })?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original = field.file_name().unwrap_or_default().to_string();
        if original.is_empty() {
            return Err(ApiError::BadRequest("No selected file".to_string()));
        }

        let extension = match extension_of(&original) {
            Some(ext) if state.config.is_allowed_extension(&ext) => ext,
            _ => {
                info!(filename = %original, "Rejected upload with disallowed extension");
                return Err(ApiError::BadRequest("File type not allowed".to_string()));
            }
        };

        let uploaded_at = time::now();
        let filename = generated_filename(&original, uploaded_at).ok_or_else(|| {
            info!(filename = %original, "Nothing usable left after sanitizing");
            ApiError::BadRequest("File type not allowed".to_string())
        })?;

        let data = field.bytes().await.map_err(multipart_error)?;

        tokio::fs::create_dir_all(&state.layout.uploads).await?;
        let path = state.layout.upload_path(&filename);
        tokio::fs::write(&path, &data).await?;

        let filepath = state.layout.public_url(&path).ok_or_else(|| {
            ApiError::Internal(format!("Upload stored outside public root: {}", path.display()))
        })?;

        let asset = UploadedAsset {
            filename,
            path,
            extension,
            uploaded_at,
        };
        info!(
            filename = %asset.filename,
            extension = %asset.extension,
            bytes = data.len(),
            "File uploaded"
        );

        return Ok(Json(UploadResponse {
            success: true,
            filename: asset.filename,
            filepath,
        }));
    }

    Err(ApiError::BadRequest("No file uploaded".to_string()))
}
