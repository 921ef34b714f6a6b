//! Application configuration management.
//!
//! Configuration is stored at `~/.config/rollcall/config.json`. Every field
//! has a default, so a missing file or a partial one is fine.
//! `ROLLCALL_API_URL` and `ROLLCALL_DATA_DIR` override the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::sync::{RetryPolicy, SyncOptions};

/// Application name used for config/data directory paths
const APP_NAME: &str = "rollcall";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const API_URL_ENV: &str = "ROLLCALL_API_URL";
pub const DATA_DIR_ENV: &str = "ROLLCALL_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub submit_timeout_secs: u64,
    pub debounce_ms: u64,
    pub probe_interval_secs: u64,
    /// Prefix for every stored key
    pub namespace: String,
    pub max_attempts: Option<u32>,
    pub backoff_base_secs: u64,
    pub backoff_max_secs: u64,
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost/api".to_string(),
            request_timeout_secs: 5,
            submit_timeout_secs: 5,
            debounce_ms: 2000,
            probe_interval_secs: 15,
            namespace: APP_NAME.to_string(),
            max_attempts: None,
            backoff_base_secs: 0,
            backoff_max_secs: 300,
            data_dir: None,
        }
    }
}

impl Config {
    /// Read the config file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(API_URL_ENV).filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(dir) = var(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    /// Where the cache and the queue live
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_base: Duration::from_secs(self.backoff_base_secs),
            backoff_max: Duration::from_secs(self.backoff_max_secs),
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            submit_timeout: Duration::from_secs(self.submit_timeout_secs),
            retry: self.retry_policy(),
        }
    }
}
