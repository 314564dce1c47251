//! Configuration loading for jobcastd.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.jobcast/config.toml` (user)
//! 3. `/etc/jobcast/config.toml` (system)
//!
//! When no file exists the built-in defaults are used.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::reset::{MemoryStorage, ResetConfig, parse_time_of_day};
use crate::{JobcastBuilder, JobcastError, Result, SimilarityCacheConfig, StatusRegistryConfig};

/// Daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub status: StatusSection,
    #[serde(default)]
    pub reset: ResetSection,
}

/// Observer endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:9750).
    #[serde(default = "default_address")]
    pub address: String,
    /// Messages buffered per observer before it is dropped as lagging (default: 256).
    #[serde(default = "default_observer_buffer")]
    pub observer_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            observer_buffer: default_observer_buffer(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:9750".to_string()
}

fn default_observer_buffer() -> usize {
    crate::dissemination::DEFAULT_OBSERVER_BUFFER
}

/// Job producer settings.
#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    /// Producer polling interval in minutes (default: 10).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_minutes: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            poll_interval_minutes: default_poll_interval(),
        }
    }
}

fn default_poll_interval() -> u64 {
    crate::service::DEFAULT_POLL_INTERVAL_MINUTES
}

/// Similarity cache bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_max_entries() -> u64 {
    10_000
}

fn default_sweep_interval() -> u64 {
    10
}

/// Job status registry bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusSection {
    #[serde(default = "default_max_entries")]
    pub max_records: u64,
    #[serde(default = "default_status_ttl")]
    pub ttl_secs: u64,
}

impl Default for StatusSection {
    fn default() -> Self {
        Self {
            max_records: default_max_entries(),
            ttl_secs: default_status_ttl(),
        }
    }
}

fn default_status_ttl() -> u64 {
    24 * 3600
}

/// Demo-mode reset.
#[derive(Debug, Clone, Deserialize)]
pub struct ResetSection {
    /// Wipe and reseed storage daily (default: false).
    #[serde(default)]
    pub demo_mode: bool,
    /// Local time of day, `HH:MM` (default: "00:00").
    #[serde(default = "default_reset_at")]
    pub at: String,
    /// JSON file mapping collection names to baseline documents.
    #[serde(default)]
    pub baseline: Option<PathBuf>,
}

impl Default for ResetSection {
    fn default() -> Self {
        Self {
            demo_mode: false,
            at: default_reset_at(),
            baseline: None,
        }
    }
}

fn default_reset_at() -> String {
    "00:00".to_string()
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided; must exist)
    /// 2. `~/.jobcast/config.toml`
    /// 3. `/etc/jobcast/config.toml`
    /// 4. Built-in defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a specific config file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            JobcastError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            JobcastError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(JobcastError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".jobcast").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/jobcast/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Reset settings as a typed [`ResetConfig`].
    pub fn reset_config(&self) -> Result<ResetConfig> {
        Ok(ResetConfig::new()
            .enabled(self.reset.demo_mode)
            .at(parse_time_of_day(&self.reset.at)?))
    }

    /// Storage for the daemon, seeded from the configured baseline file.
    pub fn storage(&self) -> Result<MemoryStorage> {
        let Some(path) = &self.reset.baseline else {
            return Ok(MemoryStorage::new());
        };
        let content = fs::read_to_string(path).map_err(|e| {
            JobcastError::Configuration(format!("Failed to read baseline file {path:?}: {e}"))
        })?;
        let baseline: BTreeMap<String, Vec<serde_json::Value>> = serde_json::from_str(&content)
            .map_err(|e| {
                JobcastError::Configuration(format!("Failed to parse baseline file {path:?}: {e}"))
            })?;
        Ok(MemoryStorage::with_baseline(baseline))
    }

    /// A service builder reflecting this configuration, with `storage`
    /// as the reset target.
    pub fn builder(&self, storage: Arc<MemoryStorage>) -> Result<JobcastBuilder> {
        Ok(crate::Jobcast::builder()
            .poll_interval_minutes(self.jobs.poll_interval_minutes)
            .similarity_cache(
                SimilarityCacheConfig::new()
                    .max_entries(self.cache.max_entries)
                    .sweep_interval(Duration::from_secs(self.cache.sweep_interval_secs)),
            )
            .status_registry(
                StatusRegistryConfig::new()
                    .max_records(self.status.max_records)
                    .ttl(Duration::from_secs(self.status.ttl_secs)),
            )
            .observer_buffer(self.server.observer_buffer)
            .storage(storage)
            .reset(self.reset_config()?))
    }
}
