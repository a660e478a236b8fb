use crate::config::EngineSettings;

pub fn cmd_config(settings: &EngineSettings) -> Result<String, String> {
    settings.validate().map_err(|e| e.to_string())?;
    let paths = settings.paths();
    let body =
        serde_yaml::to_string(settings).map_err(|e| format!("failed to encode settings: {e}"))?;
    Ok(format!(
        "{}database={}\nengine_log={}\nsubtask_logs={}",
        body,
        paths.database_path().display(),
        paths.engine_log_path().display(),
        paths.subtask_logs_dir().display()
    ))
}
