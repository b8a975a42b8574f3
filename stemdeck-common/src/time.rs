//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Render a timestamp as `<unix_seconds>.<microseconds>`
///
/// Used as the collision-resistant prefix of uploaded file names and as the
/// suffix of export file names.
pub fn timestamp_token(at: DateTime<Utc>) -> String {
    format!("{}.{:06}", at.timestamp(), at.timestamp_subsec_micros())
}

/// Timestamp token for the current instant
pub fn now_token() -> String {
    timestamp_token(now())
}
