use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::client::{ClientConfig, RetryPolicy};
use crate::pipeline::PipelineConfig;

/// Application configuration loaded from TOML config file.
/// Every field has a default; the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Custom database path (overrides XDG default).
    pub db_path: Option<PathBuf>,
    /// Directory for raw API response archives (overrides XDG default).
    pub raw_dir: Option<PathBuf>,
    /// Archive every raw API response to `raw_dir`.
    pub save_raw: bool,
    /// Upstream API settings.
    pub api: ApiConfig,
    /// Season range processed by backfill and incremental runs.
    pub seasons: SeasonConfig,
}

/// Upstream statistics API configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Total attempts per request, including the first.
    pub max_retries: u32,
    /// Wait before the first retry, in seconds.
    pub request_delay_secs: f64,
    /// Multiplier applied to the wait after each further failure.
    pub backoff_factor: f64,
    pub timeout_secs: u64,
    /// Value of the `limit` query parameter sent with every request.
    pub page_limit: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.jolpi.ca/ergast/f1".to_string(),
            max_retries: 3,
            request_delay_secs: 1.0,
            backoff_factor: 2.0,
            timeout_secs: 30,
            page_limit: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SeasonConfig {
    /// First season of the historical range (inclusive).
    pub start: i32,
    /// Last season of the historical range (inclusive).
    pub end: i32,
    /// Target season for incremental runs. Falls back to `end`.
    pub current: Option<i32>,
}

impl Default for SeasonConfig {
    fn default() -> Self {
        Self {
            start: 2010,
            end: 2024,
            current: None,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/paddock/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => Self::from_toml(&contents).unwrap_or_else(|e| {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }),
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        let config = toml::from_str::<AppConfig>(contents)?;
        log::info!("Loaded config ({} API attempts per request)", config.api.max_retries);
        Ok(config)
    }

    /// HTTP client settings derived from the `[api]` section.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api.base_url.clone(),
            timeout: Duration::from_secs(self.api.timeout_secs),
            page_limit: self.api.page_limit,
            retry: RetryPolicy {
                max_attempts: self.api.max_retries.max(1),
                initial_delay: secs_to_duration(self.api.request_delay_secs),
                multiplier: self.api.backoff_factor,
            },
        }
    }

    /// Orchestrator settings derived from the `[seasons]` section.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            start_season: self.seasons.start,
            end_season: self.seasons.end,
            current_season: self.seasons.current.unwrap_or(self.seasons.end),
        }
    }

    /// Raw archive directory: config value or XDG default.
    pub fn resolve_raw_dir(&self) -> PathBuf {
        self.raw_dir.clone().unwrap_or_else(default_raw_dir)
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Negative or non-finite values collapse to zero.
fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or_default()
}

/// Resolve the default database path using XDG data directory.
pub fn default_db_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join("paddock.db")
    } else {
        // Fallback: current directory
        PathBuf::from("paddock.db")
    }
}

/// Resolve the default raw archive directory using XDG data directory.
pub fn default_raw_dir() -> PathBuf {
    ProjectDirs::from("", "", crate::APP_NAME)
        .map(|dirs| dirs.data_dir().join("raw"))
        .unwrap_or_else(|| PathBuf::from("data/raw"))
}
