//! TOML configuration kept next to the data at `{app_dir}/config.toml`.
//!
//! A missing file or missing fields fall back to defaults, a broken file is reported and
//! ignored.

use std::{io::ErrorKind, path::Path, time::Duration};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Program receiving the notification title and body as arguments. Platform default when
    /// unset.
    #[serde(default)]
    pub command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// How often the daemon rereads habits to pick up changes made through the cli.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
}

fn default_sync_interval_secs() -> u64 {
    30
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: default_sync_interval_secs(),
        }
    }
}

impl DaemonConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

impl Config {
    pub fn load(app_dir: &Path) -> Result<Self> {
        let path = app_dir.join(CONFIG_FILE_NAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => Err(e)?,
        };
        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!("Ignoring invalid config {path:?}: {e}");
                Ok(Self::default())
            }
        }
    }
}
