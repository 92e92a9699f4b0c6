//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the backend URL, where the session storage lives, and the
//! last used username.
//!
//! Configuration is stored at `~/.config/siakad/config.json`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_BASE_URL;
use crate::storage::file::{DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};

/// Application name used for config/data directory paths
const APP_NAME: &str = "siakad";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    /// Directory shared by every running instance for the session storage
    pub storage_dir: Option<PathBuf>,
    /// How often to look for sessions changed by other instances
    pub watch_poll_ms: Option<u64>,
    pub last_username: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.storage_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Watcher poll interval, never shorter than `MIN_POLL_INTERVAL`
    pub fn poll_interval(&self) -> Duration {
        self.watch_poll_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL)
            .max(MIN_POLL_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url(), "http://localhost:9090/api/v1");
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_overrides() {
        let config: Config = serde_json::from_str(
            r#"{"api_base_url":"https://siakad.example/api/v1","storage_dir":"/tmp/siakad","watch_poll_ms":100}"#,
        )
        .unwrap();
        assert_eq!(config.api_base_url(), "https://siakad.example/api/v1");
        assert_eq!(config.storage_dir().unwrap(), PathBuf::from("/tmp/siakad"));
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.last_username, None);
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let config: Config = serde_json::from_str(r#"{"watch_poll_ms":0}"#).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }
}
