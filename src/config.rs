//! Configuration for vidshelf paths and background work.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (VIDSHELF_HOME, VIDSHELF_MEDIA)
//! 2. Config file (.vidshelf/config.yaml)
//! 3. Defaults (~/.vidshelf)
//!
//! Config file discovery:
//! - Searches current directory and parents for .vidshelf/config.yaml
//! - `home` is relative to the .vidshelf/ directory, `media` to the project root

pub mod paths;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub thumbnails: ThumbnailSettings,
    #[serde(default)]
    pub ffmpeg: FfmpegSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory holding the database and settings
    pub home: Option<String>,
    /// Managed media folder
    pub media: Option<String>,
}

/// Timeout and retry policy for thumbnail jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailSettings {
    /// Per-attempt extraction timeout in milliseconds (default: 10s)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Total attempts per job, including the first (default: 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds (default: 500)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// How often the completion barrier re-checks the queue (default: 100)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}
fn default_max_attempts() -> u32 {
    2
}
fn default_retry_delay_ms() -> u64 {
    500
}
fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ThumbnailSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Where to find ffmpeg and how big thumbnails are
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FfmpegSettings {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}
fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}
fn default_width() -> u32 {
    320
}
fn default_height() -> u32 {
    180
}

impl Default for FfmpegSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            width: default_width(),
            height: default_height(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory (database, settings)
    pub home: PathBuf,
    /// Managed media folder
    pub media: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Thumbnail queue policy
    pub thumbnails: ThumbnailSettings,
    /// Frame extractor settings
    pub ffmpeg: FfmpegSettings,
}

impl ResolvedConfig {
    /// Configuration rooted at `home` with every other value defaulted
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            media: home.join("media"),
            home,
            config_file: None,
            thumbnails: ThumbnailSettings::default(),
            ffmpeg: FfmpegSettings::default(),
        }
    }

    /// SQLite catalog location
    pub fn database_path(&self) -> PathBuf {
        self.home.join("library.db")
    }

    /// Settings file location
    pub fn settings_path(&self) -> PathBuf {
        self.home.join("settings.json")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".vidshelf").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".vidshelf");

    let config_file = find_config_file();

    let mut resolved = if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;

        let vidshelf_dir = config_path.parent().unwrap_or(Path::new("."));
        let base_dir = vidshelf_dir.parent().unwrap_or(Path::new("."));

        let home = match config.paths.home {
            Some(ref home_path) => resolve_path(vidshelf_dir, home_path),
            None => default_home,
        };
        let media = match config.paths.media {
            Some(ref media_path) => resolve_path(base_dir, media_path),
            None => home.join("media"),
        };

        ResolvedConfig {
            home,
            media,
            config_file: config_file.clone(),
            thumbnails: config.thumbnails,
            ffmpeg: config.ffmpeg,
        }
    } else {
        ResolvedConfig::with_home(default_home)
    };

    // Environment wins over the file
    if let Ok(env_home) = std::env::var("VIDSHELF_HOME") {
        let home = PathBuf::from(env_home);
        if resolved.media == resolved.home.join("media") {
            resolved.media = home.join("media");
        }
        resolved.home = home;
    }
    if let Ok(env_media) = std::env::var("VIDSHELF_MEDIA") {
        resolved.media = PathBuf::from(env_media);
    }

    Ok(resolved)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
