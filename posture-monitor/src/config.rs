//! Monitor Configuration
//!
//! Configuration management for the posture monitor client.

use anyhow::{Context, Result};
use posture_monitor_core::backend::{
    DEFAULT_BASE_URL, METRICS_PATH, PLACEHOLDER_PATH, START_CAMERA_PATH, STOP_CAMERA_PATH,
    VIDEO_FEED_PATH,
};
use posture_monitor_core::{BackendEndpoints, ControllerConfig, HttpBackend};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Monitor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Posture service location
    #[serde(default)]
    pub backend: BackendConfig,

    /// Metrics polling
    #[serde(default)]
    pub polling: PollingConfig,

    /// Camera release on stop and exit
    #[serde(default)]
    pub release: ReleaseConfig,
}

/// Posture service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the posture service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Live stream endpoint
    #[serde(default = "default_video_feed_path")]
    pub video_feed_path: String,

    /// Metrics endpoint
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,

    /// Camera release endpoint
    #[serde(default = "default_stop_camera_path")]
    pub stop_camera_path: String,

    /// Camera open endpoint
    #[serde(default = "default_start_camera_path")]
    pub start_camera_path: String,

    /// Image shown while idle
    #[serde(default = "default_placeholder_path")]
    pub placeholder_path: String,
}

/// Metrics polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Pause after each completed tick, in milliseconds
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,

    /// Per-request timeout in milliseconds (absent = wait indefinitely)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
}

/// Camera release configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
    /// How long to wait for the release request, in milliseconds
    #[serde(default = "default_release_timeout")]
    pub timeout_ms: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_video_feed_path() -> String {
    VIDEO_FEED_PATH.to_string()
}

fn default_metrics_path() -> String {
    METRICS_PATH.to_string()
}

fn default_stop_camera_path() -> String {
    STOP_CAMERA_PATH.to_string()
}

fn default_start_camera_path() -> String {
    START_CAMERA_PATH.to_string()
}

fn default_placeholder_path() -> String {
    PLACEHOLDER_PATH.to_string()
}

fn default_poll_interval() -> u64 {
    200
}

fn default_release_timeout() -> u64 {
    2000
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            video_feed_path: default_video_feed_path(),
            metrics_path: default_metrics_path(),
            stop_camera_path: default_stop_camera_path(),
            start_camera_path: default_start_camera_path(),
            placeholder_path: default_placeholder_path(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
            request_timeout_ms: None,
        }
    }
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_release_timeout(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

impl ReleaseConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Default configuration file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("posture-monitor")
            .join("monitor.toml")
    }

    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path`, writing defaults there if not found
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            let config = Config::default();
            config.save_to(path)?;
            tracing::info!("Wrote default configuration to {}", path.display());
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Check values that would only fail later, at request time
    pub fn validate(&self) -> Result<()> {
        self.endpoints()?;
        if self.polling.interval_ms == 0 {
            anyhow::bail!("polling.interval_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn endpoints(&self) -> Result<BackendEndpoints> {
        let mut endpoints = BackendEndpoints::new(&self.backend.base_url)
            .context("Invalid backend.base_url")?;
        endpoints.video_feed_path = self.backend.video_feed_path.clone();
        endpoints.metrics_path = self.backend.metrics_path.clone();
        endpoints.stop_camera_path = self.backend.stop_camera_path.clone();
        endpoints.start_camera_path = self.backend.start_camera_path.clone();
        endpoints.placeholder_path = self.backend.placeholder_path.clone();
        Ok(endpoints)
    }

    /// Build the HTTP client for the configured service
    pub fn http_backend(&self) -> Result<HttpBackend> {
        Ok(HttpBackend::new(self.endpoints()?)
            .context("Failed to create HTTP client")?
            .with_metrics_timeout(self.polling.request_timeout()))
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            poll_interval: self.polling.interval(),
            release_timeout: self.release.timeout(),
        }
    }
}
