use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::TimeDelta;
use directories::ProjectDirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{Result, SyncError};

const FALLBACK_BASE_URL: &str = "http://localhost:3001";

/// Settings for the note store and its API client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Root URL of the notes API (without the `/api/v1` suffix)
    pub api_base_url: Option<String>,

    /// Notes requested per page
    pub page_size: u32,

    /// Seconds an untouched empty draft survives before it is swept
    pub draft_ttl_secs: u64,

    /// Seconds before error and save notices are cleared
    pub notice_ttl_secs: u64,

    /// How often the background sweeper runs, in milliseconds
    pub sweep_interval_ms: u64,

    /// Per-request timeout for the HTTP client
    pub request_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            api_base_url: None,
            page_size: 10,
            draft_ttl_secs: 30,
            notice_ttl_secs: 3,
            sweep_interval_ms: 1000,
            request_timeout_secs: 30,
        }
    }
}

impl StoreConfig {
    /// Location of the config file under the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "notesync").map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Reads and validates a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading store config from {}", path.display());
        let raw = fs::read_to_string(path)?;
        let config: StoreConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        info!("Loaded store config from {}", path.display());
        Ok(config)
    }

    /// Loads the config at `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(SyncError::ConfigError {
                message: "page_size must be at least 1".to_string(),
            });
        }
        if self.draft_ttl_secs == 0 {
            return Err(SyncError::ConfigError {
                message: "draft_ttl_secs must be at least 1".to_string(),
            });
        }
        checked_seconds("draft_ttl_secs", self.draft_ttl_secs)?;
        checked_seconds("notice_ttl_secs", self.notice_ttl_secs)?;
        Ok(())
    }

    // Configured value first, then the environment, then the local dev server
    pub fn base_url(&self) -> String {
        if let Some(url) = &self.api_base_url {
            return url.clone();
        }

        if let Ok(url) = std::env::var("NOTES_API_URL") {
            if !url.trim().is_empty() {
                return url;
            }
        }

        FALLBACK_BASE_URL.to_string()
    }

    /// Draft lifetime; values past chrono's range saturate.
    pub fn draft_ttl(&self) -> TimeDelta {
        checked_seconds("draft_ttl_secs", self.draft_ttl_secs).unwrap_or(TimeDelta::MAX)
    }

    pub fn notice_ttl(&self) -> TimeDelta {
        checked_seconds("notice_ttl_secs", self.notice_ttl_secs).unwrap_or(TimeDelta::MAX)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn checked_seconds(field: &str, secs: u64) -> Result<TimeDelta> {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| SyncError::ConfigError {
            message: format!("{} is too large: {}", field, secs),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = StoreConfig {
            api_base_url: Some("https://notes.example.com".to_string()),
            page_size: 25,
            ..StoreConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = StoreConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.base_url(), "https://notes.example.com");
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "page_size": 5 }"#).unwrap();

        let loaded = StoreConfig::load(&path).unwrap();
        assert_eq!(loaded.page_size, 5);
        assert_eq!(loaded.draft_ttl_secs, 30);
    }

    #[test]
    fn rejects_zero_page_size() {
        let config = StoreConfig {
            page_size: 0,
            ..StoreConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SyncError::ConfigError { .. })
        ));
    }

    #[test]
    fn rejects_lifetimes_chrono_cannot_represent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "draft_ttl_secs": 100000000000000000 }"#).unwrap();
        assert!(matches!(
            StoreConfig::load(&path),
            Err(SyncError::ConfigError { .. })
        ));

        let config = StoreConfig {
            notice_ttl_secs: u64::MAX,
            ..StoreConfig::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.notice_ttl(), TimeDelta::MAX);
    }

    #[test]
    fn absent_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = StoreConfig::load_or_default(&dir.path().join("nope.json")).unwrap();
        assert_eq!(loaded, StoreConfig::default());
    }
}
