//! # Configuration
//!
//! [`AppConfig`] gathers one section per module. It is loaded once before
//! supervision starts and never mutated afterwards.
//!
//! ## File location
//!
//! ```text
//! $GRAM_HOME/              (defaults to $HOME/.gram)
//!   config/gram.toml
//!   db/                    (default storage path)
//! ```
//!
//! [`AppConfig::init_or_read`] reads the file, or on first run creates the
//! directory tree and writes the defaults.
//!
//! ## Example
//!
//! ```toml
//! [log]
//! level = "debug"
//!
//! [network]
//! port = 7000
//! ```
//!
//! Every section and field is optional; missing values fall back to
//! [`Default`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Root directory name under `$HOME`.
const GRAM_DIR: &str = ".gram";

/// Directory holding the config file, relative to the root.
const CONFIG_DIR: &str = "config";

const CONFIG_FILE: &str = "gram.toml";

/// Default storage directory, relative to the root.
const DB_DIR: &str = "db";

/// Default log directory, relative to the root.
const LOG_DIR: &str = "log";

/// Overrides the root directory.
pub const HOME_ENV: &str = "GRAM_HOME";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot locate home directory: set GRAM_HOME or HOME")]
    NoHome,

    #[error("Config I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// All configuration values used across the node.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub log: LogConfig,
    pub storage: StorageConfig,
    pub execution: ExecutionConfig,
    pub network: NetworkConfig,
}

/// Diagnostic sink settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Colourise level names.
    pub color: bool,
    /// Show the emitting module path.
    pub target: bool,
    /// Directory for `gram.log`. Logs go to stdout only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            color: true,
            target: false,
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the snapshot.
    pub path: PathBuf,
    /// Snapshot file name inside `path`.
    pub snapshot_file: String,
}

impl StorageConfig {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            path: root.as_ref().join(DB_DIR),
            ..Default::default()
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(GRAM_DIR).join(DB_DIR),
            snapshot_file: "snapshot.json".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Pending requests the execution actor buffers before callers wait.
    pub queue_capacity: usize,
    pub max_key_len: usize,
    pub max_value_len: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 32,
            max_key_len: 256,
            max_value_len: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: String,
    /// `0` picks a free port.
    pub port: u16,
}

impl NetworkConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 1211,
        }
    }
}

impl AppConfig {
    /// Root directory: `$GRAM_HOME`, else `$HOME/.gram`.
    pub fn root_dir() -> Result<PathBuf, ConfigError> {
        if let Some(root) = std::env::var_os(HOME_ENV) {
            return Ok(PathBuf::from(root));
        }
        let home = std::env::var_os("HOME").ok_or(ConfigError::NoHome)?;
        Ok(PathBuf::from(home).join(GRAM_DIR))
    }

    pub fn config_path(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates the config file at `path`.
    pub fn read_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Reads the config under the root directory, creating it with defaults on
    /// first run.
    pub fn init_or_read() -> Result<Self, ConfigError> {
        Self::init_or_read_in(&Self::root_dir()?)
    }

    pub fn init_or_read_in(root: &Path) -> Result<Self, ConfigError> {
        let path = Self::config_path(root);
        if path.exists() {
            return Self::read_from(&path);
        }

        let log_dir = root.join(LOG_DIR);
        let config = AppConfig {
            log: LogConfig {
                dir: Some(log_dir.clone()),
                ..Default::default()
            },
            storage: StorageConfig::new(root),
            ..Default::default()
        };

        let config_dir = root.join(CONFIG_DIR);
        create_dir(&config_dir)?;
        create_dir(&config.storage.path)?;
        create_dir(&log_dir)?;

        let encoded = toml::to_string(&config)?;
        std::fs::write(&path, encoded).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(config)
    }

    /// Rejects values the modules cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("storage.path is empty".into()));
        }
        if self.storage.snapshot_file.is_empty() {
            return Err(ConfigError::Invalid("storage.snapshot_file is empty".into()));
        }
        if self.execution.queue_capacity == 0 {
            return Err(ConfigError::Invalid("execution.queue_capacity must be > 0".into()));
        }
        if self.execution.max_key_len == 0 || self.execution.max_value_len == 0 {
            return Err(ConfigError::Invalid("execution limits must be > 0".into()));
        }
        if self.network.host.is_empty() {
            return Err(ConfigError::Invalid("network.host is empty".into()));
        }
        Ok(())
    }
}

fn create_dir(path: &Path) -> Result<(), ConfigError> {
    std::fs::create_dir_all(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
