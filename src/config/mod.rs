//! Configuration for the proxy server
//!
//! Configuration is loaded in order of precedence:
//! 1. Environment variables (highest priority)
//! 2. Config file (see [`Config::resolve_path`])
//! 3. Built-in defaults (lowest priority)
//!
//! The proxy core only ever sees a validated [`Config`]; anything that fails
//! validation is a fatal startup error.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

// ─────────────────────────────────────────────────────────────────────────────
// Submodules
// ─────────────────────────────────────────────────────────────────────────────

mod backends;
mod observability;
mod serialization;


// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (maintain public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use backends::{BackendEntry, FileBackend, StreamMode};
pub use observability::{FileLogging, LogRotation, LoggingConfig};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default HTTPS port
const DEFAULT_PORT: u16 = 443;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("domain must not be empty")]
    EmptyDomain,

    #[error("at least one API backend must be configured")]
    NoBackends,

    #[error("apis[{index}]: {field} must not be empty")]
    MissingField { index: usize, field: &'static str },

    #[error("server port must be between 1 and 65535 (got {0})")]
    InvalidPort(i64),

    #[error("logging.file_rotation must be hourly, daily or never (got {0:?})")]
    InvalidRotation(String),

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// Application Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Listener settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Interface to bind on
    pub host: IpAddr,
    /// HTTPS port
    pub port: u16,
    /// Verbose request/response logging
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            debug: false,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Virtual hostname the certificate is issued for
    pub domain: String,

    /// Ordered backend list; order is the tie-break and fallback order
    pub apis: Vec<BackendEntry>,

    /// Listener settings
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domain: "api.openai.com".to_string(),
            apis: vec![BackendEntry {
                name: "Default OpenAI API".to_string(),
                endpoint: "https://api.openai.com".to_string(),
                custom_model_id: "gpt-4".to_string(),
                target_model_id: "gpt-4".to_string(),
                stream_mode: StreamMode::Unset,
                active: true,
                simulate_stream: false,
            }],
            server: ServerConfig {
                debug: true,
                ..ServerConfig::default()
            },
            logging: LoggingConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Configuration (deserialization layer)
// ─────────────────────────────────────────────────────────────────────────────

/// `[server]` section as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileServer {
    pub host: Option<String>,
    /// Wide integer so out-of-range ports reach validation instead of failing the parse
    pub port: Option<i64>,
    pub debug: Option<bool>,
}

/// Config file structure
#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileConfig {
    pub domain: Option<String>,

    /// Optional [server] section
    pub server: Option<FileServer>,

    /// Optional [logging] section
    pub logging: Option<FileLogging>,

    /// [[apis]] array of tables
    #[serde(default)]
    pub apis: Vec<FileBackend>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Loading
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Per-user config path: ~/.config/trae-proxy/config.toml
    /// Uses Unix-style ~/.config on all platforms for consistency
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| {
            p.join(".config")
                .join("trae-proxy")
                .join(CONFIG_FILE_NAME)
        })
    }

    /// Pick the config file: explicit flag > TRAE_PROXY_CONFIG > ./config.toml > user config
    ///
    /// When nothing exists yet the working-directory path is returned so that
    /// error messages and `config --init` point somewhere sensible.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        if let Ok(path) = std::env::var("TRAE_PROXY_CONFIG") {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return local;
        }

        match Self::user_config_path() {
            Some(user) if user.exists() => user,
            _ => local,
        }
    }

    /// Load, apply environment overrides and validate
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_file(path)?;
        config.apply_env_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file as written: no env overrides, no validation
    ///
    /// The backend editing commands start from this so that environment
    /// overrides never end up saved to disk.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse { reason, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse TOML text into a config (no env overrides, no validation)
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        Self::from_file(file)
    }

    /// Resolve the file layer against defaults
    fn from_file(file: FileConfig) -> Result<Self, ConfigError> {
        let server_file = file.server.unwrap_or_default();
        let defaults = ServerConfig::default();

        let host = match server_file.host {
            Some(host) => host.parse().map_err(|_| ConfigError::Parse {
                path: PathBuf::new(),
                reason: format!("server.host is not an IP address: {host:?}"),
            })?,
            None => defaults.host,
        };

        let raw_port = server_file.port.unwrap_or(i64::from(defaults.port));
        let port = u16::try_from(raw_port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or(ConfigError::InvalidPort(raw_port))?;

        Ok(Self {
            domain: file.domain.unwrap_or_default(),
            apis: file.apis.into_iter().map(BackendEntry::from_file).collect(),
            server: ServerConfig {
                host,
                port,
                debug: server_file.debug.unwrap_or(defaults.debug),
            },
            logging: LoggingConfig::from_file(file.logging)?,
        })
    }

    /// Apply TRAE_PROXY_PORT / TRAE_PROXY_DEBUG on top of the file values
    ///
    /// Takes a lookup closure so tests don't have to mutate the process env.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("TRAE_PROXY_PORT") {
            let raw: i64 = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "TRAE_PROXY_PORT",
                value: value.clone(),
            })?;
            self.server.port = u16::try_from(raw)
                .ok()
                .filter(|p| *p != 0)
                .ok_or(ConfigError::InvalidPort(raw))?;
        }

        if let Some(value) = lookup("TRAE_PROXY_DEBUG") {
            self.server.debug = value == "1" || value.eq_ignore_ascii_case("true");
        }

        Ok(())
    }

    /// Check the invariants the proxy core relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain.trim().is_empty() {
            return Err(ConfigError::EmptyDomain);
        }

        if self.apis.is_empty() {
            return Err(ConfigError::NoBackends);
        }

        for (index, api) in self.apis.iter().enumerate() {
            api.validate(index)?;
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(0));
        }

        Ok(())
    }

    /// Socket address the TLS listener binds to
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    /// Backends currently marked active, in configured order
    pub fn active_backends(&self) -> impl Iterator<Item = &BackendEntry> {
        self.apis.iter().filter(|api| api.active)
    }

    /// Default certificate path: ca/<domain>.crt
    pub fn default_cert_path(&self) -> PathBuf {
        PathBuf::from("ca").join(format!("{}.crt", self.domain))
    }

    /// Default private key path: ca/<domain>.key
    pub fn default_key_path(&self) -> PathBuf {
        PathBuf::from("ca").join(format!("{}.key", self.domain))
    }

    /// Write the config to disk, creating parent directories
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_toml())
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}
