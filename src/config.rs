use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    /// Base document origin relative urls resolve against.
    pub base_url: Option<String>,
    pub scheduler: SchedulerConfig,
    pub http: HttpConfig,
}

/// Admission, rate and concurrency limits for the prefetch scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum simultaneous in-flight loads.
    pub max_concurrent_requests: usize,
    /// Maximum dispatches inside any rolling one-second window.
    pub max_requests_per_second: usize,
    /// Minimum gap between two dispatches, regardless of window occupancy.
    pub min_delay_between_requests_ms: u64,
    /// How far ahead of the viewport the visibility trigger should fire.
    /// Advisory: surfaced to the trigger source, unused by the core.
    pub trigger_distance_px: u32,
    /// Per-load timeout before the attempt is abandoned.
    pub resource_timeout_ms: u64,
    /// Master switch; when false, admission rejects everything.
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 4,
            max_requests_per_second: 6,
            min_delay_between_requests_ms: 100,
            trigger_distance_px: 200,
            resource_timeout_ms: 8000,
            enabled: true,
        }
    }
}

impl SchedulerConfig {
    /// Reject configurations the controller cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.max_concurrent_requests < 1 {
            return Err(crate::error::PrefetchError::Config(
                "max_concurrent_requests must be >= 1".to_string(),
            ));
        }
        if self.max_requests_per_second < 1 {
            return Err(crate::error::PrefetchError::Config(
                "max_requests_per_second must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Minimum inter-dispatch gap as a Duration.
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_between_requests_ms)
    }

    /// Per-load timeout as a Duration.
    pub fn resource_timeout(&self) -> Duration {
        Duration::from_millis(self.resource_timeout_ms)
    }
}

/// HTTP client settings for the production loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub connect_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("prefetchr/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout_ms: 5000,
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            base_url: None,
            scheduler: SchedulerConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}
