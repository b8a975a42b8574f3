//! Storage layout and public asset paths
//!
//! Everything the service writes lives under one public asset root:
//!
//! ```text
//! <root>/static/uploads/<timestamp>_<name>
//! <root>/static/separated/<job_id>/<model>/<track>/<stem>.mp3
//! <root>/static/exports/export_<timestamp>.mp4
//! ```
//!
//! Files under the public root are addressed by URLs starting with
//! [`PUBLIC_PREFIX`]. Any path or URL received from a client goes through
//! [`validate_relative_path`] before it touches the filesystem.

use crate::{Error, Result};
use std::path::{Component, Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// URL prefix of the public asset root
pub const PUBLIC_PREFIX: &str = "/static/";

/// Directory layout rooted at the configured root folder
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub public_root: PathBuf,
    pub uploads: PathBuf,
    pub separated: PathBuf,
    pub exports: PathBuf,
}

impl StorageLayout {
    pub fn new(root_folder: &Path) -> Self {
        let public_root = root_folder.join("static");
        Self {
            uploads: public_root.join("uploads"),
            separated: public_root.join("separated"),
            exports: public_root.join("exports"),
            public_root,
        }
    }

    /// Create the three storage directories (idempotent)
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.uploads, &self.separated, &self.exports] {
            std::fs::create_dir_all(dir)?;
            info!("Storage directory ready: {}", dir.display());
        }
        Ok(())
    }

    /// Path of an uploaded asset
    pub fn upload_path(&self, filename: &str) -> PathBuf {
        self.uploads.join(filename)
    }

    /// Output base directory of one separation job
    pub fn job_dir(&self, job_id: &Uuid) -> PathBuf {
        self.separated.join(job_id.to_string())
    }

    /// Path of an export file
    pub fn export_path(&self, filename: &str) -> PathBuf {
        self.exports.join(filename)
    }

    /// Public URL of a file under the public root
    ///
    /// Returns `None` for paths outside the public root.
    pub fn public_url(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.public_root).ok()?;
        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => segments.push(part.to_str()?.to_string()),
                _ => return None,
            }
        }
        if segments.is_empty() {
            return None;
        }
        Some(format!("{}{}", PUBLIC_PREFIX, segments.join("/")))
    }

    /// Map a client-supplied public URL to a filesystem path
    ///
    /// The URL must start with [`PUBLIC_PREFIX`] and the remainder must pass
    /// [`validate_relative_path`]. Existence is not checked.
    pub fn resolve_public_url(&self, url: &str) -> Result<PathBuf> {
        let relative = url.strip_prefix(PUBLIC_PREFIX).ok_or_else(|| {
            Error::InvalidPath(format!("URL must start with {}: {}", PUBLIC_PREFIX, url))
        })?;
        validate_relative_path(relative)?;
        Ok(self.public_root.join(relative))
    }
}

/// Reject paths that could escape the directory they are joined onto
///
/// Rejected: empty paths, absolute-looking paths (leading `/`, drive
/// prefixes such as `C:`), backslashes, NUL bytes, and any `..` segment.
pub fn validate_relative_path(relative: &str) -> Result<()> {
    let invalid = |reason: &str| Err(Error::InvalidPath(format!("{}: {:?}", reason, relative)));

    if relative.is_empty() {
        return invalid("Empty path");
    }
    if relative.starts_with('/') {
        return invalid("Absolute path");
    }
    if relative.contains('\\') || relative.contains('\0') {
        return invalid("Illegal character in path");
    }
    if relative.split('/').any(|segment| segment == "..") {
        return invalid("Parent directory segment");
    }
    if relative
        .split('/')
        .next()
        .is_some_and(|first| first.len() >= 2 && first.as_bytes()[1] == b':')
    {
        return invalid("Drive prefix");
    }
    Ok(())
}

/// Lower-cased extension after the last `.`, if the name has one
pub fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// File name without its final extension
pub fn file_stem(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

/// Reduce a client-supplied file name to a safe single path segment
///
/// ASCII letters, digits, `.`, `_` and `-` are kept; whitespace and path
/// separators become `_`; everything else is dropped. Leading dots and
/// underscores are stripped so the result is never hidden or relative.
pub fn sanitize_filename(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' => cleaned.push(ch),
            '/' | '\\' => cleaned.push('_'),
            c if c.is_whitespace() => cleaned.push('_'),
            _ => {}
        }
    }
    cleaned.trim_start_matches(['.', '_']).to_string()
}

/// True when `name` is one plain path segment (no separators, not `.`/`..`)
pub fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Sorted names of the entries in a directory, for diagnostics
pub fn list_dir(path: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(path) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
