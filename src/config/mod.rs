pub mod error;
pub mod load;
pub mod paths;
pub mod save;
pub mod settings;

pub use error::ConfigError;
pub use load::{load_engine_settings, load_engine_settings_from};
pub use paths::{
    bootstrap_state_root, default_engine_config_path, default_state_root_path, StatePaths,
    CONFIG_PATH_ENV, ENGINE_SETTINGS_FILE_NAME, GLOBAL_STATE_DIR,
};
pub use save::save_engine_settings;
pub use settings::{
    EngineSettings, DEFAULT_CONTEXT_SIZE_LIMIT_BYTES, DEFAULT_WATCHDOG_IDLE_TIMEOUT,
};
