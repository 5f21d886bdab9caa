//! Configuration management for pagefeed.
//!
//! The configuration file is JSON by default (`~/.config/pagefeed/config.json`);
//! a path ending in `.toml` is read as TOML with the same keys.

pub mod target;

pub use target::TargetConfig;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use regex::Regex;
use serde::Deserialize;

use crate::fetcher::parallel::DEFAULT_WORKERS;

pub const DEFAULT_TIMEZONE: &str = "+08:00";

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file for the page cache; empty means the platform data dir.
    #[serde(rename = "CacheDB")]
    pub cache_db: String,

    /// How long cached pages are kept, e.g. `1d12h`; empty keeps them forever.
    #[serde(rename = "CacheLifetime")]
    pub cache_lifetime: String,

    /// Request timeout in milliseconds; 0 disables the timeout.
    #[serde(rename = "HttpTimeout")]
    pub http_timeout_ms: u64,

    /// Maximum number of pages fetched at once.
    #[serde(rename = "Workers")]
    pub workers: usize,

    /// Reference timezone for parsed dates, as a fixed offset or `UTC`.
    #[serde(rename = "Timezone")]
    pub timezone: String,

    #[serde(rename = "Targets")]
    pub targets: Vec<TargetConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_db: String::new(),
            cache_lifetime: String::new(),
            http_timeout_ms: 0,
            workers: DEFAULT_WORKERS,
            timezone: DEFAULT_TIMEZONE.to_string(),
            targets: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default path.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path()?,
        };

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;

        if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content).map_err(|e| ConfigError::Toml { path, source: e })
        } else {
            serde_json::from_str(&content).map_err(|e| ConfigError::Json { path, source: e })
        }
    }

    /// Get the default config file path: `~/.config/pagefeed/config.json`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("pagefeed").join("config.json"))
    }

    pub fn cache_lifetime(&self) -> Result<Option<Duration>, ConfigError> {
        parse_lifetime(&self.cache_lifetime)
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        (self.http_timeout_ms > 0).then(|| Duration::from_millis(self.http_timeout_ms))
    }

    pub fn timezone(&self) -> Result<FixedOffset, ConfigError> {
        parse_timezone(&self.timezone)
    }
}

/// Parse durations such as `30m`, `1d12h` or `90s`. Empty input means none.
pub fn parse_lifetime(s: &str) -> Result<Option<Duration>, ConfigError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }

    let invalid = || ConfigError::InvalidLifetime(s.to_string());
    let whole = Regex::new(r"^([1-9][0-9]*[smhd])+$").map_err(|_| invalid())?;
    if !whole.is_match(s) {
        return Err(invalid());
    }

    let part = Regex::new(r"([1-9][0-9]*)([smhd])").map_err(|_| invalid())?;
    let mut secs: u64 = 0;
    for caps in part.captures_iter(s) {
        let n: u64 = caps[1].parse().map_err(|_| invalid())?;
        let unit = match &caps[2] {
            "s" => 1,
            "m" => 60,
            "h" => 3600,
            _ => 86400,
        };
        secs = n
            .checked_mul(unit)
            .and_then(|v| secs.checked_add(v))
            .ok_or_else(invalid)?;
    }

    Ok(Some(Duration::from_secs(secs)))
}

pub fn parse_timezone(s: &str) -> Result<FixedOffset, ConfigError> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("utc") || s == "Z" {
        return FixedOffset::east_opt(0).ok_or_else(|| ConfigError::InvalidTimezone(s.into()));
    }
    s.parse::<FixedOffset>()
        .map_err(|_| ConfigError::InvalidTimezone(s.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid cache lifetime {0:?}, use a form like '30m' or '1d12h'")]
    InvalidLifetime(String),

    #[error("Invalid timezone {0:?}, use an offset like '+08:00' or 'UTC'")]
    InvalidTimezone(String),

    #[error("Target {target:?} has no URL")]
    NoUrls { target: String },

    #[error("Target {target:?} has no index pattern")]
    NoIndexPattern { target: String },

    #[error("Target {target:?} has no output path")]
    MissingFeedPath { target: String },

    #[error("Target {target:?}: invalid URL {url:?}: {source}")]
    InvalidUrl {
        target: String,
        url: String,
        source: url::ParseError,
    },

    #[error("Target {target:?}: {field} has {got} patterns, expected 0, 1 or {urls}")]
    PatternCount {
        target: String,
        field: &'static str,
        got: usize,
        urls: usize,
    },

    #[error("Target {target:?}: {field}[{position}] does not compile: {source}")]
    InvalidPattern {
        target: String,
        field: &'static str,
        position: usize,
        source: regex::Error,
    },
}
