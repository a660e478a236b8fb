use super::{default_engine_config_path, ConfigError, EngineSettings};
use std::path::Path;

pub fn load_engine_settings() -> Result<EngineSettings, ConfigError> {
    let path = default_engine_config_path()?;
    load_engine_settings_from(&path)
}

pub fn load_engine_settings_from(path: &Path) -> Result<EngineSettings, ConfigError> {
    let settings = EngineSettings::from_path(path)?;
    settings.validate()?;
    Ok(settings)
}
