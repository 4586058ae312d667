//! Monitor configuration
//!
//! Declarative description of the pages to monitor, their interception
//! rules and login automation settings, plus the on-disk store for
//! `monitor-config.json`. Field names stay camelCase on the wire so
//! existing config files keep working.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Floor for the per-page refresh interval
pub const MIN_REFRESH_SECONDS: u64 = 3;
/// Refresh interval used when a page does not set one
pub const DEFAULT_REFRESH_SECONDS: u64 = 15;

fn default_auto_run_after_seconds() -> u64 {
    30
}

/// Top-level monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    /// Seconds the host waits before auto-starting the monitor
    #[serde(default = "default_auto_run_after_seconds")]
    pub auto_run_after_seconds: u64,
    /// Start the host application at login
    #[serde(default)]
    pub launch_at_login: bool,
    /// Monitoring is paused (the host skips auto-start)
    #[serde(default)]
    pub paused: bool,
    /// Pages to monitor
    #[serde(default)]
    pub pages: Vec<PageConfig>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            auto_run_after_seconds: default_auto_run_after_seconds(),
            launch_at_login: false,
            paused: false,
            pages: Vec::new(),
        }
    }
}

/// One monitored page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageConfig {
    /// Unique, stable across runs
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub url: String,
    /// Requested refresh interval; the effective interval never drops
    /// below [`MIN_REFRESH_SECONDS`]
    #[serde(default)]
    pub refresh_seconds: u64,
    /// Run this page on the headless backend
    #[serde(default)]
    pub headless: bool,
    /// Interception rules, evaluated in order
    #[serde(default)]
    pub listeners: Vec<ListenerConfig>,
    #[serde(default)]
    pub login: LoginConfig,
}

impl PageConfig {
    /// Effective refresh interval: configured seconds (default 15 when
    /// unset) floored at 3 seconds.
    pub fn refresh_interval(&self) -> Duration {
        let seconds = if self.refresh_seconds == 0 {
            DEFAULT_REFRESH_SECONDS
        } else {
            self.refresh_seconds
        };
        Duration::from_secs(seconds.max(MIN_REFRESH_SECONDS))
    }
}

/// One interception rule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Substring match against the request URL (case-sensitive)
    pub url_keyword: String,
    /// Header to read (name lookup tolerates case differences)
    pub header_key: String,
    /// Logical storage key the captured value is filed under
    pub primary_key: String,
}

/// Unattended login settings for one page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Attempt login automatically on page (re)load
    #[serde(default)]
    pub auto: bool,
    /// Permit auto-login when the page runs on the headless backend
    #[serde(default)]
    pub headless: bool,
    #[serde(default)]
    pub login_type_selector: String,
    #[serde(default)]
    pub username_selector: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password_selector: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub submit_selector: String,
}

impl MonitorConfig {
    /// Validate the configuration, rejecting shapes the monitor cannot run
    pub fn validate(&self) -> Result<()> {
        let mut seen_ids = std::collections::HashSet::new();

        for page in &self.pages {
            if page.id.is_empty() {
                return Err(Error::config("page id must not be empty"));
            }
            if !seen_ids.insert(page.id.as_str()) {
                return Err(Error::config(format!("duplicate page id '{}'", page.id)));
            }
            if page.url.is_empty() {
                return Err(Error::config(format!("page '{}' has no url", page.id)));
            }

            for listener in &page.listeners {
                if listener.url_keyword.is_empty() {
                    return Err(Error::config(format!(
                        "listener '{}' on page '{}' has no urlKeyword",
                        listener.name, page.id
                    )));
                }
                if listener.header_key.is_empty() {
                    return Err(Error::config(format!(
                        "listener '{}' on page '{}' has no headerKey",
                        listener.name, page.id
                    )));
                }
                if listener.primary_key.is_empty() {
                    return Err(Error::config(format!(
                        "listener '{}' on page '{}' has no primaryKey",
                        listener.name, page.id
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Reads and writes `monitor-config.json` in a data directory
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            config_path: data_dir.as_ref().join("monitor-config.json"),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load the configuration. A missing or unreadable file yields the
    /// default configuration; unknown fields are ignored and missing
    /// fields take their defaults.
    pub fn load(&self) -> MonitorConfig {
        let raw = match std::fs::read_to_string(&self.config_path) {
            Ok(raw) => raw,
            Err(_) => return MonitorConfig::default(),
        };

        match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", self.config_path.display(), e);
                MonitorConfig::default()
            }
        }
    }

    /// Validate and persist the configuration
    pub fn save(&self, config: &MonitorConfig) -> Result<()> {
        config.validate()?;
        let json = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.config_path, json)?;
        Ok(())
    }
}
