use crate::accessor::{SqliteSubtaskRepository, SubtaskRepository};
use crate::config::{
    default_engine_config_path, default_state_root_path, load_engine_settings_from, ConfigError,
    EngineSettings,
};
use crate::shared::ids::SubtaskId;

pub fn map_config_err(err: ConfigError) -> String {
    err.to_string()
}

/// Settings from the configured path, or defaults under `~/.subtask-engine`
/// when no settings file exists yet.
pub fn load_settings() -> Result<EngineSettings, String> {
    let path = default_engine_config_path().map_err(map_config_err)?;
    if !path.exists() {
        let root = default_state_root_path().map_err(map_config_err)?;
        return Ok(EngineSettings::for_state_root(root));
    }
    load_engine_settings_from(&path).map_err(map_config_err)
}

pub fn open_repository(settings: &EngineSettings) -> Result<SqliteSubtaskRepository, String> {
    let db_path = settings.paths().database_path();
    if !db_path.exists() {
        return Err(format!("no engine database at {}", db_path.display()));
    }
    let repository = SqliteSubtaskRepository::open(&db_path).map_err(|e| e.to_string())?;
    repository.ensure_schema().map_err(|e| e.to_string())?;
    Ok(repository)
}

pub fn parse_subtask_id(raw: &str) -> Result<SubtaskId, String> {
    raw.parse::<i64>()
        .map(SubtaskId)
        .map_err(|_| format!("invalid subtask id `{raw}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn subtask_ids_must_be_numeric() {
        assert_eq!(parse_subtask_id("42"), Ok(SubtaskId(42)));
        assert!(parse_subtask_id("forty-two").is_err());
    }

    #[test]
    fn missing_database_is_reported() {
        let dir = tempdir().expect("tempdir");
        let settings = EngineSettings::for_state_root(dir.path());
        let err = open_repository(&settings)
            .err()
            .expect("missing database");
        assert!(err.contains("no engine database"));
    }
}
