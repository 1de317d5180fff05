//! Configuration management for logrouter

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::logging::{Level, RotationSchedule, DEFAULT_RETENTION};

/// Categories of disk errors for user-friendly messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskErrorKind {
    /// Disk is full or quota exceeded
    DiskFull,
    /// Permission denied (read or write)
    PermissionDenied,
    /// File or directory not found
    NotFound,
    /// Other IO error
    Other,
}

impl DiskErrorKind {
    /// Get a user-friendly message for this error kind
    pub fn user_message(&self) -> &'static str {
        match self {
            DiskErrorKind::DiskFull => "disk full, free space needed to keep logging",
            DiskErrorKind::PermissionDenied => "permission denied writing to the log directory",
            DiskErrorKind::NotFound => "file or directory not found",
            DiskErrorKind::Other => "failed to write log file",
        }
    }
}

/// Categorize an IO error into a user-friendly category
pub fn categorize_io_error(e: &std::io::Error) -> DiskErrorKind {
    use std::io::ErrorKind;

    match e.kind() {
        ErrorKind::WriteZero => DiskErrorKind::DiskFull,
        ErrorKind::PermissionDenied => DiskErrorKind::PermissionDenied,
        ErrorKind::NotFound => DiskErrorKind::NotFound,
        _ => {
            #[cfg(unix)]
            {
                if let Some(os_error) = e.raw_os_error() {
                    // ENOSPC = 28, EDQUOT = 122 on Linux and 69 on macOS
                    if os_error == 28 || os_error == 122 || os_error == 69 {
                        return DiskErrorKind::DiskFull;
                    }
                    // EACCES
                    if os_error == 13 {
                        return DiskErrorKind::PermissionDenied;
                    }
                }
            }
            DiskErrorKind::Other
        }
    }
}

/// Create a user-friendly error message from an IO error
pub fn friendly_io_error_message(e: &std::io::Error, context: &str) -> String {
    match categorize_io_error(e) {
        DiskErrorKind::Other => format!("{}: {}", context, e),
        kind => format!("{}: {}", context, kind.user_message()),
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Directory holding the live log and its archives (`~` is expanded)
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Live file name without extension; the live file is `<base_name>.log`
    #[serde(default = "default_base_name")]
    pub base_name: String,

    /// Earlier base names whose archives still count towards retention
    #[serde(default)]
    pub legacy_base_names: Vec<String>,

    /// Debug mode: dependency sources log from DEBUG instead of WARNING,
    /// and the console shows DEBUG
    #[serde(default)]
    pub debug: bool,

    /// Minimum level written to the log file: ERROR, WARNING, INFO, DEBUG or DB
    #[serde(default = "default_file_logging_preset")]
    pub file_logging_preset: Level,

    /// Number of compressed archives kept (0 keeps all)
    #[serde(default = "default_retention")]
    pub retention: usize,

    /// Move pruned archives to the trash instead of deleting them
    #[serde(default)]
    pub trash_rotated_logs: bool,

    /// Process character encoding, used for the exit message
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// The application's own logical source
    #[serde(default = "default_primary_source")]
    pub primary_source: String,

    /// Dependency sources, tagged in output
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,

    /// Sources whose records are discarded
    #[serde(default = "default_silenced_sources")]
    pub silenced_sources: Vec<String>,

    /// When the live file is rotated
    #[serde(default)]
    pub rotation: RotationSchedule,
}

fn default_log_dir() -> PathBuf {
    logs_dir()
}

fn default_base_name() -> String {
    "logrouter".to_string()
}

fn default_file_logging_preset() -> Level {
    Level::Db
}

fn default_retention() -> usize {
    DEFAULT_RETENTION
}

fn default_encoding() -> String {
    "UTF-8".to_string()
}

fn default_primary_source() -> String {
    "app".to_string()
}

fn default_sources() -> Vec<String> {
    vec![
        "axum.server".to_string(),
        "hyper.proto".to_string(),
        "html5ever".to_string(),
        "reqwest".to_string(),
    ]
}

fn default_silenced_sources() -> Vec<String> {
    vec!["tower_http.trace".to_string()]
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            base_name: default_base_name(),
            legacy_base_names: Vec::new(),
            debug: false,
            file_logging_preset: default_file_logging_preset(),
            retention: default_retention(),
            trash_rotated_logs: false,
            encoding: default_encoding(),
            primary_source: default_primary_source(),
            sources: default_sources(),
            silenced_sources: default_silenced_sources(),
            rotation: RotationSchedule::default(),
        }
    }
}

impl LogConfig {
    /// Create a configuration logging into `log_dir`
    pub fn with_log_dir(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from file, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific file, or return default if not found
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
            config.rotation.interval().context("Invalid rotation schedule")?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Log directory with `~` expanded
    pub fn resolved_log_dir(&self) -> PathBuf {
        let raw = self.log_dir.to_string_lossy();
        PathBuf::from(shellexpand::tilde(&raw).into_owned())
    }

    /// Path of the live log file
    pub fn log_file_path(&self) -> PathBuf {
        self.resolved_log_dir().join(format!("{}.log", self.base_name))
    }
}

/// Get the base configuration directory (~/.logrouter)
/// Falls back to ./.logrouter if home directory cannot be determined
pub fn config_dir() -> PathBuf {
    try_config_dir().unwrap_or_else(|| PathBuf::from(".logrouter"))
}

/// Try to get the base configuration directory, returning None if home dir is unavailable
pub fn try_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".logrouter"))
}

/// Get the path to the config file
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the path to the default logs directory
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Ensure the config directory and the configured log directory exist
pub fn ensure_directories(config: &LogConfig) -> Result<()> {
    std::fs::create_dir_all(config_dir()).context("Failed to create config directory")?;
    std::fs::create_dir_all(config.resolved_log_dir())
        .context("Failed to create logs directory")?;
    Ok(())
}
