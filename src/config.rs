//! Tunables for a game session, loadable from TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

const APP_DIR_NAME: &str = "memory-match";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// How long a mismatched pair stays face up.
    #[serde(default = "default_mismatch_delay_ms")]
    pub mismatch_delay_ms: u64,
    /// Pause between the final match and the completed status.
    #[serde(default = "default_completion_delay_ms")]
    pub completion_delay_ms: u64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Records kept per difficulty.
    #[serde(default = "default_high_score_limit")]
    pub high_score_limit: usize,
    /// Directory for persisted state; the user config dir when unset.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            mismatch_delay_ms: default_mismatch_delay_ms(),
            completion_delay_ms: default_completion_delay_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            high_score_limit: default_high_score_limit(),
            storage_dir: None,
        }
    }
}

impl GameConfig {
    /// # Errors
    /// Returns `GameError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| GameError::Config(e.to_string()))
    }

    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn mismatch_delay(&self) -> Duration {
        Duration::from_millis(self.mismatch_delay_ms)
    }

    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn resolved_storage_dir(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .unwrap_or_else(|| glib::user_config_dir().join(APP_DIR_NAME))
    }
}

fn default_mismatch_delay_ms() -> u64 {
    1000
}

fn default_completion_delay_ms() -> u64 {
    1000
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_high_score_limit() -> usize {
    5
}
