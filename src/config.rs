// src/config.rs
// =============================================================================
// Run settings: batch size, pacing, probe timeouts, file locations.
//
// Settings come from three places, later ones win:
// 1. built-in defaults (Settings::default)
// 2. an optional JSON config file (--config settings.json)
// 3. command-line flags (applied in main.rs)
//
// Example config file (every field is optional):
//   {
//     "batch_size": 5,
//     "batch_delay": "2s",
//     "head_timeout": "5s",
//     "get_timeout": "3s",
//     "mode": "report_only"
//   }
// =============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Bookmarks probed concurrently per batch.
pub const DEFAULT_BATCH_SIZE: usize = 3;
/// Pause between batches.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(3000);
/// Budget for the HEAD request.
pub const DEFAULT_HEAD_TIMEOUT: Duration = Duration::from_millis(5000);
/// Budget for the fallback GET request.
pub const DEFAULT_GET_TIMEOUT: Duration = Duration::from_millis(3000);

/// What to do with a bookmark whose URL is dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalMode {
    /// Delete it from the store.
    #[default]
    Remove,
    /// Only count and report it.
    ReportOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub batch_size: usize,

    #[serde(with = "humantime_serde")]
    pub batch_delay: Duration,

    #[serde(with = "humantime_serde")]
    pub head_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub get_timeout: Duration,

    pub max_redirects: usize,

    pub user_agent: String,

    /// URL schemes worth probing; everything else is left alone.
    pub checkable_schemes: Vec<String>,

    pub mode: RemovalMode,

    pub bookmarks_path: PathBuf,

    /// Key/value file holding the latest snapshot.
    pub state_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
            head_timeout: DEFAULT_HEAD_TIMEOUT,
            get_timeout: DEFAULT_GET_TIMEOUT,
            max_redirects: 5,
            user_agent: concat!("bookmark-guardian/", env!("CARGO_PKG_VERSION")).to_string(),
            checkable_schemes: vec!["http".to_string(), "https".to_string()],
            mode: RemovalMode::Remove,
            bookmarks_path: PathBuf::from("bookmarks.json"),
            state_path: PathBuf::from("bookmark-guardian-state.json"),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(json)?;
        Ok(settings)
    }

    /// Reject settings the engine can't run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size must be at least 1"));
        }
        if self.head_timeout.is_zero() {
            return Err(ConfigError::invalid("head_timeout must be greater than zero"));
        }
        if self.get_timeout.is_zero() {
            return Err(ConfigError::invalid("get_timeout must be greater than zero"));
        }
        if self.checkable_schemes.is_empty() {
            return Err(ConfigError::invalid("checkable_schemes must not be empty"));
        }
        Ok(())
    }
}
