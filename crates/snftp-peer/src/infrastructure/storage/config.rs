//! TOML-based configuration for the peer.
//!
//! `AppConfig` is read from an optional file at a platform-specific path:
//! - Windows:  `%APPDATA%\snftp\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/snftp/config.toml` or `~/.config/snftp/config.toml`
//! - macOS:    `~/Library/Application Support/snftp/config.toml`
//!
//! The file is optional.  A missing file yields [`AppConfig::default`], and
//! every field carries a serde default so a partial file loads too:
//!
//! ```toml
//! [peer]
//! save_dir = "/home/me/Downloads/snftp"
//! log_level = "debug"
//!
//! [network]
//! transfer_port = 7639
//! announce_on_refresh = false
//! ```
//!
//! The password is deliberately absent from the schema: it is supplied on the
//! command line or through `SNFTP_PASSWORD` and never touches the disk.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use snftp_core::protocol::DISCOVERY_PORT;
use thiserror::Error;

/// Default TCP port for the transfer connection.
pub const DEFAULT_TRANSFER_PORT: u16 = 7639;

/// Why the config file could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration, as read from `config.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub peer: PeerConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Local behaviour of this peer.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PeerConfig {
    /// Directory received files are written into.
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Port and bind-address settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Address the listening role binds to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// TCP port for the encrypted transfer connection.
    #[serde(default = "default_transfer_port")]
    pub transfer_port: u16,
    /// UDP port for LAN discovery.
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    /// Also broadcast this host's name when refreshing the roster.
    #[serde(default = "default_true")]
    pub announce_on_refresh: bool,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_save_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join("Downloads").join("snftp"))
        .unwrap_or_else(|| PathBuf::from("snftp-received"))
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_transfer_port() -> u16 {
    DEFAULT_TRANSFER_PORT
}
fn default_discovery_port() -> u16 {
    DISCOVERY_PORT
}
fn default_true() -> bool {
    true
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            transfer_port: default_transfer_port(),
            discovery_port: default_discovery_port(),
            announce_on_refresh: default_true(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Loads `AppConfig` from the platform default path.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when no config directory can
/// be derived from the environment, otherwise as [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let dir = platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)?;
    load_config_from(&dir.join("config.toml"))
}

/// Loads `AppConfig` from `path`.  A missing file yields the defaults.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for any read failure other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(AppConfig::default()),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    Ok(toml::from_str(&content)?)
}

/// Resolves the platform config base directory including the `snftp` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("snftp"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("snftp"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("snftp")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
