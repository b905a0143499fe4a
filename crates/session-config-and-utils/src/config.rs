//! Configuration management.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default API base URL (can be overridden at compile time via SESSION_GUARD_API_URL env var).
pub const DEFAULT_API_BASE_URL: &str = match option_env!("SESSION_GUARD_API_URL") {
    Some(url) => url,
    None => "https://api.example.invalid",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Timing knobs for token expiry detection and session-loss handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTimings {
    /// Seconds before `exp` at which an access token already counts as expired.
    pub expiry_buffer_secs: u64,
    /// Window during which repeated expiration triggers are absorbed.
    pub expiration_debounce_ms: u64,
    /// How long the coordinator stays in the handling-expiration state.
    pub expiration_reset_ms: u64,
    /// Automatic reset of the logging-out flag if logout never completes.
    pub logout_safety_valve_ms: u64,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            expiry_buffer_secs: 60,
            expiration_debounce_ms: 500,
            expiration_reset_ms: 2_000,
            logout_safety_valve_ms: 10_000,
        }
    }
}

/// Bounded polling budget for payment completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerSettings {
    /// Total number of list calls before giving up.
    pub max_attempts: u32,
    /// Delay between consecutive list calls.
    pub interval_ms: u64,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            interval_ms: 2_000,
        }
    }
}

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Base URL of the backend API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Session timing configuration.
    #[serde(default)]
    pub session: SessionTimings,
    /// Payment completion polling configuration.
    #[serde(default)]
    pub poller: PollerSettings,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            session: SessionTimings::default(),
            poller: PollerSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from the config file, falling back to defaults.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Some(log_level) = env_non_empty("SESSION_GUARD_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(url) = env_non_empty("SESSION_GUARD_API_URL") {
            self.api_base_url = url;
        }
    }

    /// Reject settings that would make the poller or the coordinator inert.
    fn validate(&self) -> CoreResult<()> {
        if self.poller.max_attempts == 0 {
            return Err(CoreError::Config(
                "poller.max_attempts must be at least 1".to_string(),
            ));
        }
        self.api_base_url()?;
        Ok(())
    }

    /// Get the API base URL as a parsed URL.
    pub fn api_base_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_base_url).map_err(CoreError::from)
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}
