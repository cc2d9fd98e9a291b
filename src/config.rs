//! Configuration file handling
//!
//! Settings come from a TOML file (by default `config.toml` in the platform
//! config directory, e.g. `~/.config/splitstream/` on Linux). Every section
//! is optional. Command-line flags override file values.
//!
//! ```toml
//! [api]
//! token = "..."
//! timeout_secs = 30
//!
//! [pagination]
//! page_limit = 200
//! max_pages = 1000   # 0 disables the bound
//!
//! [logging]
//! level = "info"
//! json = false
//!
//! [cache]
//! snapshots = true
//! ttl_hours = 24
//! ```

use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::api::client::SPLITWISE_BASE_URL;
use crate::cache::{SnapshotStore, DEFAULT_SNAPSHOT_TTL_HOURS};
use crate::stream::paginated::DEFAULT_MAX_PAGES;
use crate::stream::PaginationLimits;

/// Environment variable holding the API token
pub const TOKEN_ENV_VAR: &str = "SPLITWISE_TOKEN";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    /// The config file is not valid TOML for this schema
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// No token in flags, environment or config file
    #[error("No API token: pass --token, set SPLITWISE_TOKEN, or set api.token in the config file")]
    MissingToken,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub pagination: PaginationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaginationConfig {
    /// Page size requested from the expenses endpoint
    #[serde(default = "default_page_limit")]
    pub page_limit: i64,

    /// Maximum pages per stream; 0 disables the bound
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// "off", "error", "warn", "info", "debug" or "trace". Unset falls back to `RUST_LOG`.
    #[serde(default)]
    pub level: Option<String>,

    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Persist categories and currencies between runs
    #[serde(default)]
    pub snapshots: bool,

    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
}

fn default_base_url() -> String {
    SPLITWISE_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_limit() -> i64 {
    200
}

fn default_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}

fn default_ttl_hours() -> u64 {
    DEFAULT_SNAPSHOT_TTL_HOURS
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_limit: default_page_limit(),
            max_pages: default_max_pages(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            snapshots: false,
            ttl_hours: default_ttl_hours(),
        }
    }
}

impl Config {
    /// Default config file location, if a home directory exists
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "splitstream").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Loads configuration
    ///
    /// An explicitly given path must exist. When no path is given, the default
    /// location is used if present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Config::default()),
            },
        };

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Picks the token: flag first, then environment, then config file
    pub fn resolve_token(
        &self,
        flag: Option<&str>,
        env: Option<String>,
    ) -> Result<String, ConfigError> {
        flag.map(str::to_string)
            .or(env)
            .or_else(|| self.api.token.clone())
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingToken)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn limits(&self) -> PaginationLimits {
        match self.pagination.max_pages {
            0 => PaginationLimits::unbounded(),
            pages => PaginationLimits::max_pages(pages),
        }
    }

    /// Snapshot store for the reference cache, when enabled
    pub fn snapshot_store(&self) -> Option<SnapshotStore> {
        if !self.cache.snapshots {
            return None;
        }
        SnapshotStore::new(self.cache.ttl_hours)
    }
}
