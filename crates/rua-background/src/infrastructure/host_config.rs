//! TOML configuration for the `rua-host` process.
//!
//! Read from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\RandomUserAgent\host.toml`
//! - Linux:    `~/.config/random-useragent/host.toml`
//! - macOS:    `~/Library/Application Support/RandomUserAgent/host.toml`
//!
//! Example:
//!
//! ```toml
//! [host]
//! log_level = "debug"
//!
//! [storage]
//! data_dir = "/var/lib/random-useragent"
//! sync_available = false
//! ```
//!
//! Every field has a default, so a missing file (or a file written by an
//! older release) still yields a complete [`HostConfig`].  Command-line flags
//! take precedence over anything read here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for host configuration file operations.
#[derive(Debug, Error)]
pub enum HostConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostConfig {
    #[serde(default)]
    pub host: HostSection,
    #[serde(default)]
    pub storage: StorageSection,
}

/// Process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostSection {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Where and how settings are persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageSection {
    /// Directory for `sync.json`, `local.json` and the selector hint.
    /// Absent means settings live in memory only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// When `false` the sync area behaves like a browser with sync disabled.
    #[serde(default = "default_true")]
    pub sync_available: bool,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: None,
            sync_available: default_true(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`HostConfigError::NoPlatformConfigDir`] when the base directory
/// cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, HostConfigError> {
    platform_config_dir().ok_or(HostConfigError::NoPlatformConfigDir)
}

/// Full path of the default config file.
///
/// # Errors
///
/// See [`config_dir`].
pub fn config_file_path() -> Result<PathBuf, HostConfigError> {
    Ok(config_dir()?.join("host.toml"))
}

/// Loads the config at `path`, returning the defaults if it does not exist.
///
/// # Errors
///
/// Returns [`HostConfigError::Io`] for file-system errors other than "not
/// found", and [`HostConfigError::Parse`] if the TOML is malformed.
pub fn load_from(path: &Path) -> Result<HostConfig, HostConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HostConfig::default()),
        Err(source) => Err(HostConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Loads the config from the default location.
///
/// # Errors
///
/// See [`config_dir`] and [`load_from`].
pub fn load() -> Result<HostConfig, HostConfigError> {
    load_from(&config_file_path()?)
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`HostConfigError::Io`] for file-system failures or
/// [`HostConfigError::Serialize`] if serialization fails.
pub fn save_to(path: &Path, config: &HostConfig) -> Result<(), HostConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| HostConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| HostConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("RandomUserAgent"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("random-useragent"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("RandomUserAgent")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
