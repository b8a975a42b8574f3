//! Configuration loading and root folder resolution
//!
//! Resolution order for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! The result is a [`ServiceConfig`], built once at startup and shared by
//! reference with every component. Nothing here is global.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "STEMDECK_ROOT_FOLDER";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5000;

/// Default upload ceiling (100 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Default export duration ceiling in seconds (advisory)
pub const DEFAULT_MAX_EXPORT_DURATION_SECS: u64 = 3600;

/// Default wall-clock limit for one separation run
pub const DEFAULT_SEPARATOR_TIMEOUT_SECS: u64 = 600;

/// Default separation model identifier
pub const DEFAULT_MODEL: &str = "htdemucs";

/// Default two-stems target; the complementary stem is `no_<target>`
pub const DEFAULT_TWO_STEMS: &str = "vocals";

/// Origin prefix the browser may leave on track URLs
pub const DEFAULT_LOCAL_ORIGIN: &str = "http://localhost:5000";

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub port: u16,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
        }
    }
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    if cfg!(any(target_os = "linux", target_os = "macos", target_os = "windows")) {
        // ~/.local/share/stemdeck, ~/Library/Application Support/stemdeck, %LOCALAPPDATA%\stemdeck
        dirs::data_local_dir()
            .map(|d| d.join("stemdeck"))
            .unwrap_or_else(|| PathBuf::from("./stemdeck_data"))
    } else {
        PathBuf::from("./stemdeck_data")
    }
}

/// `[logging]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub level: Option<String>,
}

/// `[tools]` table: external programs
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<String>,
    pub separator_program: Option<String>,
    pub separator_args: Option<Vec<String>>,
    pub separator_timeout_secs: Option<u64>,
    pub model: Option<String>,
    pub two_stems: Option<String>,
    pub mp3_bitrate: Option<u32>,
}

/// `[limits]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_upload_bytes: Option<usize>,
    pub max_export_duration_secs: Option<u64>,
    pub allowed_extensions: Option<Vec<String>>,
    pub video_extensions: Option<Vec<String>>,
}

/// `[export]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub audio_bitrate: Option<String>,
    pub normalize_single_track: Option<bool>,
    pub local_origin: Option<String>,
}

/// On-disk TOML configuration. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub port: Option<u16>,
    pub logging: LoggingConfig,
    pub tools: ToolsConfig,
    pub limits: LimitsConfig,
    pub export: ExportConfig,
}

/// Where the TOML configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Loaded from this file
    File(PathBuf),
    /// No file found; compiled defaults apply
    Missing,
}

/// TOML configuration plus its origin, so the caller can log it once
/// tracing is initialized
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub toml: TomlConfig,
    pub source: ConfigSource,
}

/// Parse TOML text into a [`TomlConfig`]
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Locate the default configuration file for a module
///
/// Linux: `~/.config/stemdeck/<module>.toml`, then `/etc/stemdeck/<module>.toml`.
/// Other platforms: the user config directory only.
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", module_name);
    let user_config = dirs::config_dir().map(|d| d.join("stemdeck").join(&file_name));

    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/stemdeck").join(&file_name);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load the TOML configuration
///
/// An explicitly requested file must exist and parse. A missing default file
/// is not an error: compiled defaults apply. A default file that exists but
/// does not parse is an error (fail fast on misconfiguration).
pub fn load_toml_config(module_name: &str, explicit: Option<&Path>) -> Result<LoadedConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_path(module_name) {
            Some(path) => path,
            None => {
                return Ok(LoadedConfig {
                    toml: TomlConfig::default(),
                    source: ConfigSource::Missing,
                })
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let toml = parse_toml_config(&content)?;

    Ok(LoadedConfig {
        toml,
        source: ConfigSource::File(path),
    })
}

/// Root folder resolution: CLI → `STEMDECK_ROOT_FOLDER` → TOML → default
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml(mut self, toml: &TomlConfig) -> Self {
        self.toml_value = toml.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Resolved service configuration
///
/// Constructed once at startup and passed by reference to each component.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub port: u16,
    pub log_level: String,

    /// FFmpeg executable
    pub ffmpeg_path: String,
    /// Separator executable (e.g. `python`)
    pub separator_program: String,
    /// Arguments placed before the separation options (e.g. `-m demucs`)
    pub separator_args: Vec<String>,
    pub separator_timeout: Duration,
    pub model: String,
    pub two_stems: String,
    pub mp3_bitrate: u32,

    pub max_upload_bytes: usize,
    /// Advisory only; never enforced against media content
    pub max_export_duration_secs: u64,
    pub allowed_extensions: Vec<String>,
    pub video_extensions: Vec<String>,

    /// AAC bitrate of exported audio (FFmpeg syntax, e.g. `192k`)
    pub export_audio_bitrate: String,
    pub normalize_single_track: bool,
    pub local_origin: String,
}

impl ServiceConfig {
    /// Compiled defaults rooted at `root_folder`
    pub fn with_root(root_folder: impl Into<PathBuf>) -> Self {
        Self {
            root_folder: root_folder.into(),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            separator_program: "python".to_string(),
            separator_args: vec!["-m".to_string(), "demucs".to_string()],
            separator_timeout: Duration::from_secs(DEFAULT_SEPARATOR_TIMEOUT_SECS),
            model: DEFAULT_MODEL.to_string(),
            two_stems: DEFAULT_TWO_STEMS.to_string(),
            mp3_bitrate: 192,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_export_duration_secs: DEFAULT_MAX_EXPORT_DURATION_SECS,
            allowed_extensions: vec!["mp3".to_string(), "mp4".to_string(), "wav".to_string()],
            video_extensions: vec!["mp4".to_string()],
            export_audio_bitrate: "192k".to_string(),
            normalize_single_track: false,
            local_origin: DEFAULT_LOCAL_ORIGIN.to_string(),
        }
    }

    /// Overlay TOML values on the compiled defaults
    ///
    /// `root_folder` and `port` are passed in already resolved (they have CLI
    /// and ENV tiers that TOML cannot see).
    pub fn from_toml(root_folder: PathBuf, port: u16, toml: &TomlConfig) -> Result<Self> {
        let mut config = Self::with_root(root_folder);
        config.port = port;

        if let Some(level) = &toml.logging.level {
            config.log_level = level.clone();
        }

        let tools = &toml.tools;
        if let Some(path) = &tools.ffmpeg_path {
            config.ffmpeg_path = path.clone();
        }
        if let Some(program) = &tools.separator_program {
            config.separator_program = program.clone();
        }
        if let Some(args) = &tools.separator_args {
            config.separator_args = args.clone();
        }
        if let Some(secs) = tools.separator_timeout_secs {
            if secs == 0 {
                return Err(Error::Config(
                    "tools.separator_timeout_secs must be greater than zero".to_string(),
                ));
            }
            config.separator_timeout = Duration::from_secs(secs);
        }
        if let Some(model) = &tools.model {
            config.model = model.clone();
        }
        if let Some(target) = &tools.two_stems {
            config.two_stems = target.clone();
        }
        if let Some(bitrate) = tools.mp3_bitrate {
            config.mp3_bitrate = bitrate;
        }

        let limits = &toml.limits;
        if let Some(bytes) = limits.max_upload_bytes {
            config.max_upload_bytes = bytes;
        }
        if let Some(secs) = limits.max_export_duration_secs {
            config.max_export_duration_secs = secs;
        }
        if let Some(exts) = &limits.allowed_extensions {
            config.allowed_extensions = normalize_extensions(exts);
        }
        if let Some(exts) = &limits.video_extensions {
            config.video_extensions = normalize_extensions(exts);
        }
        if config.allowed_extensions.is_empty() {
            return Err(Error::Config(
                "limits.allowed_extensions must not be empty".to_string(),
            ));
        }

        let export = &toml.export;
        if let Some(bitrate) = &export.audio_bitrate {
            config.export_audio_bitrate = bitrate.clone();
        }
        if let Some(normalize) = export.normalize_single_track {
            config.normalize_single_track = normalize;
        }
        if let Some(origin) = &export.local_origin {
            config.local_origin = origin.clone();
        }

        for name in [&config.model, &config.two_stems] {
            if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
                return Err(Error::Config(format!(
                    "Invalid model or stem name: {:?}",
                    name
                )));
            }
        }

        Ok(config)
    }

    /// Whether an upload with this (lower-cased) extension is accepted
    pub fn is_allowed_extension(&self, ext: &str) -> bool {
        self.allowed_extensions.iter().any(|e| e == ext)
    }

    /// Whether this (lower-cased) extension is a video container
    pub fn is_video_extension(&self, ext: &str) -> bool {
        self.video_extensions.iter().any(|e| e == ext)
    }

    /// Fixed stem vocabulary produced by a two-stems run
    pub fn stems(&self) -> Vec<String> {
        vec![self.two_stems.clone(), format!("no_{}", self.two_stems)]
    }
}

fn normalize_extensions(exts: &[String]) -> Vec<String> {
    exts.iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
