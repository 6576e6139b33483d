//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::parse_duration;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Spreadsheet source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    /// Shared spreadsheet URL (must be viewable by anyone with the link)
    #[serde(default = "default_sheet_url")]
    pub url: String,

    /// Tab holding the result rows
    #[serde(default = "default_main_tab")]
    pub main_tab: String,

    /// Optional tab with PartType, Name, ImageURL columns; empty disables images
    #[serde(default = "default_images_tab")]
    pub images_tab: String,
}

fn default_sheet_url() -> String {
    "https://docs.google.com/spreadsheets/d/1h1j87RQAdwZ2XS_dLlVQ6p768HPkRxOovWoDgKtQ1Xg/edit?usp=sharing"
        .to_string()
}

fn default_main_tab() -> String {
    "Sheet1".to_string()
}

fn default_images_tab() -> String {
    "Images".to_string()
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            url: default_sheet_url(),
            main_tab: default_main_tab(),
            images_tab: default_images_tab(),
        }
    }
}

impl SheetConfig {
    pub fn images_tab(&self) -> Option<&str> {
        let tab = self.images_tab.trim();
        (!tab.is_empty()).then_some(tab)
    }
}

/// Caching and fetch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a fetched sheet is reused (e.g. "10m", "600s")
    #[serde(default = "default_sheet_ttl")]
    pub sheet_ttl: String,

    /// How long a prepared (normalized and indexed) sheet is reused
    #[serde(default = "default_board_ttl")]
    pub board_ttl: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
}

/// Bounds for how long a fetched sheet may be reused.
const MIN_SHEET_TTL: Duration = Duration::from_secs(5 * 60);
const MAX_SHEET_TTL: Duration = Duration::from_secs(15 * 60);

fn default_sheet_ttl() -> String {
    "10m".to_string()
}

fn default_board_ttl() -> String {
    "15m".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sheet_ttl: default_sheet_ttl(),
            board_ttl: default_board_ttl(),
            request_timeout_seconds: default_timeout(),
        }
    }
}

impl CacheConfig {
    pub fn sheet_ttl(&self) -> Duration {
        parse_duration(&self.sheet_ttl).unwrap_or(Duration::from_secs(600))
    }

    pub fn board_ttl(&self) -> Duration {
        parse_duration(&self.board_ttl).unwrap_or(Duration::from_secs(900))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Leaderboard display defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    /// Hide entries used fewer times than this
    #[serde(default = "default_min_usage")]
    pub min_usage: usize,

    /// Attach part images to leaderboard rows
    #[serde(default)]
    pub show_images: bool,
}

fn default_min_usage() -> usize {
    1
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            min_usage: default_min_usage(),
            show_images: false,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log filter used when neither `RUST_LOG` nor `--log-level` is given
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub sheet: SheetConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub leaderboard: LeaderboardConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            sheet: SheetConfig::default(),
            cache: CacheConfig::default(),
            leaderboard: LeaderboardConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if self.leaderboard.min_usage == 0 {
            return Err(ConfigError::ValidationError(
                "Leaderboard min_usage must be at least 1".to_string(),
            ));
        }

        if self.cache.request_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        for (name, value) in [
            ("sheet_ttl", &self.cache.sheet_ttl),
            ("board_ttl", &self.cache.board_ttl),
        ] {
            match parse_duration(value) {
                Some(d) if !d.is_zero() => {}
                _ => {
                    return Err(ConfigError::ValidationError(format!(
                        "cache.{} must be a positive duration like \"10m\", got \"{}\"",
                        name, value
                    )))
                }
            }
        }

        let sheet_ttl = self.cache.sheet_ttl();
        if sheet_ttl < MIN_SHEET_TTL || sheet_ttl > MAX_SHEET_TTL {
            return Err(ConfigError::ValidationError(format!(
                "cache.sheet_ttl must be between 5m and 15m, got \"{}\"",
                self.cache.sheet_ttl
            )));
        }

        if self.sheet.main_tab.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "sheet.main_tab must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
