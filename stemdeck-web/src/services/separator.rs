//! Demucs separation adapter
//!
//! Runs the pretrained separation model as a subprocess:
//!
//! ```text
//! python -m demucs --two-stems=vocals --mp3 --mp3-bitrate 192 \
//!     -n htdemucs --out <output_base> <input>
//! ```
//!
//! The model writes `<output_base>/<model>/<track>/<stem>.mp3`, where
//! `<track>` is the input file name without its extension.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use stemdeck_common::config::ServiceConfig;

use super::command::{self, CommandError, CommandSpec};
use crate::models::StemSet;

/// File extension of produced stems (`--mp3`)
pub const STEM_EXTENSION: &str = "mp3";

/// Separation errors
#[derive(Debug, Error)]
pub enum SeparationError {
    /// Input path has no usable file name
    #[error("Invalid separation input: {0}")]
    InvalidInput(String),

    /// Separator could not be run
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Wall-clock limit exceeded; partial output is left in place
    #[error("Separation timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    /// Separator exited with a nonzero code
    #[error("Command failed (return code {}):\n{stderr}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    Failed { code: Option<i32>, stderr: String },

    /// Separator succeeded but the track directory is missing
    #[error("Separator failed to create output files in {}", .0.display())]
    MissingOutput(PathBuf),

    /// Output directory housekeeping failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a finished separation run
#[derive(Debug, Clone)]
pub struct SeparationOutput {
    /// The command line that was run, for diagnostics
    pub command: String,
    /// Stems found on disk (possibly empty)
    pub stems: StemSet,
}

/// Separation adapter
#[derive(Debug, Clone)]
pub struct Separator {
    program: String,
    base_args: Vec<String>,
    model: String,
    two_stems: String,
    stems: Vec<String>,
    mp3_bitrate: u32,
    timeout: Duration,
}

impl Separator {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            program: config.separator_program.clone(),
            base_args: config.separator_args.clone(),
            model: config.model.clone(),
            two_stems: config.two_stems.clone(),
            stems: config.stems(),
            mp3_bitrate: config.mp3_bitrate,
            timeout: config.separator_timeout,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Command line for separating `input` into `output_base`
    pub fn command_for(&self, input: &Path, output_base: &Path) -> CommandSpec {
        let mut args = self.base_args.clone();
        args.extend([
            format!("--two-stems={}", self.two_stems),
            "--mp3".to_string(),
            "--mp3-bitrate".to_string(),
            self.mp3_bitrate.to_string(),
            "-n".to_string(),
            self.model.clone(),
            "--out".to_string(),
            output_base.to_string_lossy().into_owned(),
            input.to_string_lossy().into_owned(),
        ]);
        CommandSpec::new(&self.program, args)
    }

    /// Directory the model writes stems of `track_name` into
    pub fn track_dir(&self, output_base: &Path, track_name: &str) -> PathBuf {
        output_base.join(&self.model).join(track_name)
    }

    /// Separate `input` into stems under `output_base`
    ///
    /// Stems read back afterwards always come from this run: an existing
    /// `<output_base>/<model>` subtree is removed before the separator starts.
    /// On timeout the child is killed and partial output is left in place.
    pub async fn separate(
        &self,
        input: &Path,
        output_base: &Path,
    ) -> Result<SeparationOutput, SeparationError> {
        let track_name = track_name(input)?;
        let model_dir = output_base.join(&self.model);

        if model_dir.exists() {
            tracing::debug!(dir = %model_dir.display(), "Removing existing model output");
            if let Err(e) = tokio::fs::remove_dir_all(&model_dir).await {
                tracing::warn!(dir = %model_dir.display(), error = %e, "Failed to remove model output");
            }
        }
        tokio::fs::create_dir_all(output_base).await?;

        let spec = self.command_for(input, output_base);
        tracing::info!(command = %spec, track = %track_name, "Running separation");

        let output = match command::run(&spec, Some(self.timeout)).await {
            Ok(output) => output,
            Err(CommandError::TimedOut { timeout, .. }) => {
                tracing::error!(track = %track_name, timeout_secs = timeout.as_secs(), "Separation timed out");
                return Err(SeparationError::TimedOut(timeout));
            }
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(stdout = %output.stdout, "Separator output");

        if !output.success() {
            tracing::error!(code = ?output.code, stderr = %output.stderr, "Separation failed");
            return Err(SeparationError::Failed {
                code: output.code,
                stderr: output.stderr,
            });
        }

        let track_dir = self.track_dir(output_base, &track_name);
        if !track_dir.is_dir() {
            return Err(SeparationError::MissingOutput(track_dir));
        }

        let stems = self.probe_stems(&track_dir);
        tracing::info!(
            track = %track_name,
            found = stems.len(),
            expected = self.stems.len(),
            "Separation completed"
        );

        Ok(SeparationOutput {
            command: spec.to_string(),
            stems,
        })
    }

    /// Collect the stems of the fixed vocabulary that exist in `track_dir`
    pub fn probe_stems(&self, track_dir: &Path) -> StemSet {
        let mut found = BTreeMap::new();
        for stem in &self.stems {
            let path = track_dir.join(format!("{}.{}", stem, STEM_EXTENSION));
            if path.is_file() {
                tracing::debug!(stem = %stem, path = %path.display(), "Found stem");
                found.insert(stem.clone(), path);
            } else {
                tracing::warn!(stem = %stem, path = %path.display(), "Missing stem");
            }
        }
        StemSet::new(found)
    }

    /// Whether the separator can be started (`<program> <base args> --help`)
    pub async fn is_available(&self) -> bool {
        let mut probe: Vec<&str> = self.base_args.iter().map(String::as_str).collect();
        probe.push("--help");
        command::is_available(&self.program, &probe).await
    }
}

/// Track name the model derives from an input path (file name minus extension)
pub fn track_name(input: &Path) -> Result<String, SeparationError> {
    input
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| SeparationError::InvalidInput(input.display().to_string()))
}
