//! Uploaded media assets

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use stemdeck_common::storage::{extension_of, sanitize_filename};
use stemdeck_common::time::timestamp_token;

/// A file accepted by `POST /upload`
///
/// Immutable once written; never deleted by the service.
#[derive(Debug, Clone)]
pub struct UploadedAsset {
    /// Generated name: `<timestamp token>_<sanitized original name>`
    pub filename: String,
    pub path: PathBuf,
    /// Lower-cased extension of the original name
    pub extension: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Generated storage name for an upload, or `None` when nothing usable
/// survives sanitization
pub fn generated_filename(original: &str, at: DateTime<Utc>) -> Option<String> {
    let sanitized = sanitize_filename(original);
    // The extension must survive sanitization, otherwise the stored file
    // would not be recognised as media later on
    if extension_of(&sanitized) != extension_of(original) {
        return None;
    }
    let stem = sanitized.rsplit_once('.').map(|(stem, _)| stem).unwrap_or("");
    if stem.is_empty() {
        return None;
    }
    Some(format!("{}_{}", timestamp_token(at), sanitized))
}
