use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Public base URL prepended to download links (e.g. "https://files.example.com")
    #[serde(default)]
    pub base_url: Option<String>,

    /// Path prefix of the download route used when building links
    #[serde(default = "default_file_route_prefix")]
    pub file_route_prefix: String,

    /// Quiet period before a filesystem change triggers a reindex
    #[serde(default = "default_watch_debounce_ms")]
    pub watch_debounce_ms: u64,
}

fn default_file_route_prefix() -> String {
    "/file".to_string()
}

fn default_watch_debounce_ms() -> u64 {
    250
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            file_route_prefix: default_file_route_prefix(),
            watch_debounce_ms: default_watch_debounce_ms(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }
}
