//! Application configuration management.
//!
//! Holds the backend address, which credential store to use, the reconnect
//! schedule and the last username entered.
//!
//! Configuration is stored at `~/.config/areyousleep/config.json`. The
//! `AYS_API_URL` environment variable overrides the stored backend address.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::auth::CredentialBackend;
use crate::realtime::ReconnectPolicy;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "areyousleep";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable naming the backend root URL
pub const API_URL_ENV: &str = "AYS_API_URL";

pub const DEFAULT_API_URL: &str = "http://localhost:3001";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub credential_backend: CredentialBackend,
    pub last_username: Option<String>,
    pub request_timeout_secs: u64,
    pub reconnect: ReconnectPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            credential_backend: CredentialBackend::default(),
            last_username: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.apply_api_url(&url);
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_api_url(&mut self, url: &str) {
        let url = url.trim();
        if !url.is_empty() {
            self.api_url = url.trim_end_matches('/').to_string();
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.api_url, "http://localhost:3001");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            api_url: "https://ays.example.com".to_string(),
            credential_backend: CredentialBackend::File,
            last_username: Some("alice".to_string()),
            request_timeout_secs: 10,
            reconnect: ReconnectPolicy::disabled(),
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"last_username": "bob", "reconnect": {"max_attempts": 2}}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.last_username.as_deref(), Some("bob"));
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.credential_backend, CredentialBackend::Keyring);
        assert_eq!(config.reconnect.max_attempts, 2);
        assert_eq!(config.reconnect.base_delay_ms, 1000);
    }

    #[test]
    fn test_api_url_override() {
        let mut config = Config::default();
        config.apply_api_url("  ");
        assert_eq!(config.api_url, DEFAULT_API_URL);

        config.apply_api_url("http://10.0.0.5:3001/");
        assert_eq!(config.api_url, "http://10.0.0.5:3001");
    }
}
