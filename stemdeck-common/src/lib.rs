//! # Stemdeck Common Library
//!
//! Shared code for the Stemdeck services including:
//! - Error type shared by configuration and storage code
//! - Configuration loading (CLI → ENV → TOML → compiled default)
//! - Storage layout and public asset path validation
//! - Timestamp helpers used for collision-resistant file names

pub mod config;
pub mod error;
pub mod storage;
pub mod time;

pub use error::{Error, Result};
pub use storage::StorageLayout;
