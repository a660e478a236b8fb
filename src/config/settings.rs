use super::{ConfigError, StatePaths};
use crate::shared::serde_ext::duration_string;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Matches the width of the context column in the subtask table.
pub const DEFAULT_CONTEXT_SIZE_LIMIT_BYTES: usize = 65_535;
pub const DEFAULT_WATCHDOG_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineSettings {
    pub state_root: PathBuf,
    #[serde(default = "default_context_size_limit_bytes")]
    pub context_size_limit_bytes: usize,
    #[serde(default = "default_watchdog_idle_timeout", with = "duration_string")]
    pub watchdog_idle_timeout: Duration,
    #[serde(default = "default_true")]
    pub persist_running_transition: bool,
}

fn default_context_size_limit_bytes() -> usize {
    DEFAULT_CONTEXT_SIZE_LIMIT_BYTES
}

fn default_watchdog_idle_timeout() -> Duration {
    DEFAULT_WATCHDOG_IDLE_TIMEOUT
}

fn default_true() -> bool {
    true
}

impl EngineSettings {
    pub fn for_state_root(state_root: impl Into<PathBuf>) -> Self {
        Self {
            state_root: state_root.into(),
            context_size_limit_bytes: DEFAULT_CONTEXT_SIZE_LIMIT_BYTES,
            watchdog_idle_timeout: DEFAULT_WATCHDOG_IDLE_TIMEOUT,
            persist_running_transition: true,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.state_root.as_os_str().is_empty() {
            return Err(ConfigError::Settings(
                "`state_root` must be non-empty".to_string(),
            ));
        }
        if self.context_size_limit_bytes == 0 {
            return Err(ConfigError::Settings(
                "`context_size_limit_bytes` must be greater than zero".to_string(),
            ));
        }
        if self.watchdog_idle_timeout.is_zero() {
            return Err(ConfigError::Settings(
                "`watchdog_idle_timeout` must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn paths(&self) -> StatePaths {
        StatePaths::new(&self.state_root)
    }
}
