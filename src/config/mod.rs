//! Configuration management for slack-export.
//!
//! Handles loading of request pacing, pagination and rate-limit settings.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Base URL of the Web API (no trailing slash)
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Messages requested per history/replies page (1-1000)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Pause between consecutive pages of one walk
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Pause before each thread replies walk
    #[serde(default = "default_thread_delay_ms")]
    pub thread_delay_ms: u64,

    /// Pause between workspace listing calls during bootstrap
    #[serde(default = "default_bootstrap_delay_ms")]
    pub bootstrap_delay_ms: u64,

    /// Hard cap on pages per walk; None = unbounded
    #[serde(default)]
    pub max_pages: Option<u32>,

    /// Rate-limit retry settings
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

fn default_api_base_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_page_size() -> u32 {
    1000
}

fn default_page_delay_ms() -> u64 {
    1300
}

fn default_thread_delay_ms() -> u64 {
    500
}

fn default_bootstrap_delay_ms() -> u64 {
    3050
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            page_size: default_page_size(),
            page_delay_ms: default_page_delay_ms(),
            thread_delay_ms: default_thread_delay_ms(),
            bootstrap_delay_ms: default_bootstrap_delay_ms(),
            max_pages: None,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl ExportConfig {
    /// Load configuration from an explicit path, or the default location.
    /// A missing default file yields the defaults; a missing explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = Self::config_path()?;
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: ExportConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate();

        Ok(config)
    }

    /// Get the path to the default config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not find config directory")?;

        Ok(config_dir.join("slack-export").join("config.toml"))
    }

    /// Clamp values into their valid ranges
    pub fn validate(&mut self) {
        self.page_size = self.page_size.clamp(1, 1000);
        self.request_timeout_secs = self.request_timeout_secs.max(1);
        self.api_base_url = self.api_base_url.trim_end_matches('/').to_string();
        if self.max_pages == Some(0) {
            self.max_pages = None;
        }
        self.rate_limit.validate();
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn thread_delay(&self) -> Duration {
        Duration::from_millis(self.thread_delay_ms)
    }

    pub fn bootstrap_delay(&self) -> Duration {
        Duration::from_millis(self.bootstrap_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Rate-limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Total attempts per call, counting the first (1-10)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wait used when a 429 carries no Retry-After header
    #[serde(default = "default_wait_secs")]
    pub default_wait_secs: u64,

    /// Added to every rate-limit wait
    #[serde(default = "default_extra_wait_secs")]
    pub extra_wait_secs: u64,
}

fn default_max_attempts() -> u32 {
    2
}

fn default_wait_secs() -> u64 {
    20
}

fn default_extra_wait_secs() -> u64 {
    1
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            default_wait_secs: default_wait_secs(),
            extra_wait_secs: default_extra_wait_secs(),
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&mut self) {
        self.max_attempts = self.max_attempts.clamp(1, 10);
    }
}
