use crate::config::ConfigError;
use std::path::{Path, PathBuf};

pub const GLOBAL_STATE_DIR: &str = ".subtask-engine";
pub const ENGINE_SETTINGS_FILE_NAME: &str = "engine.yaml";
pub const CONFIG_PATH_ENV: &str = "SUBTASK_ENGINE_CONFIG";

pub fn default_state_root_path() -> Result<PathBuf, ConfigError> {
    let home = std::env::var_os("HOME").ok_or(ConfigError::HomeDirectoryUnavailable)?;
    Ok(PathBuf::from(home).join(GLOBAL_STATE_DIR))
}

pub fn default_engine_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    Ok(default_state_root_path()?.join(ENGINE_SETTINGS_FILE_NAME))
}

/// Filesystem layout below the engine state root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub root: PathBuf,
}

impl StatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn required_directories(&self) -> Vec<PathBuf> {
        vec![self.logs_dir(), self.subtask_logs_dir()]
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join(ENGINE_SETTINGS_FILE_NAME)
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join("engine.db")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn engine_log_path(&self) -> PathBuf {
        crate::shared::logging::engine_log_path(&self.root)
    }

    pub fn subtask_logs_dir(&self) -> PathBuf {
        self.logs_dir().join("subtasks")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

pub fn bootstrap_state_root(paths: &StatePaths) -> Result<(), ConfigError> {
    for dir in paths.required_directories() {
        std::fs::create_dir_all(&dir).map_err(|source| ConfigError::CreateDir {
            path: dir.display().to_string(),
            source,
        })?;
    }
    Ok(())
}
