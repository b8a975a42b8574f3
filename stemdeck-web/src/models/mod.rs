//! Domain types for the Stemdeck web service

pub mod asset;
pub mod export;
pub mod stems;

pub use asset::{generated_filename, UploadedAsset};
pub use export::{VolumeSetting, DEFAULT_VOLUME};
pub use stems::StemSet;
