//! Error type shared by the stemdeck crates
//!
//! Only configuration loading and storage layout produce these. The web
//! layer turns path rejections into its own 400 responses.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Creating or reading the storage directories failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable or inconsistent TOML / environment settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// A relative path or public URL escapes the public root or is malformed
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}
