use crate::accessor::SubtaskRepository;
use crate::app::command_support::{open_repository, parse_subtask_id};
use crate::config::EngineSettings;
use crate::logs::{split_attempts, AttemptLog};

pub fn cmd_show(settings: &EngineSettings, args: &[String]) -> Result<String, String> {
    let [raw_id] = args else {
        return Err("usage: show <subtask-id>".to_string());
    };
    let subtask_id = parse_subtask_id(raw_id)?;
    let repository = open_repository(settings)?;
    let instance = repository
        .load(subtask_id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("subtask {subtask_id} not found"))?;
    serde_json::to_string_pretty(&instance).map_err(|e| format!("failed to encode subtask: {e}"))
}

pub fn cmd_logs(settings: &EngineSettings, args: &[String]) -> Result<String, String> {
    let (raw_id, attempt) = parse_logs_args(args)?;
    let subtask_id = parse_subtask_id(&raw_id)?;
    let repository = open_repository(settings)?;
    let entries = repository
        .load_logs(subtask_id)
        .map_err(|e| e.to_string())?;

    let attempts = split_attempts(&entries)
        .into_iter()
        .filter(|log| attempt.is_none() || log.run_time == attempt)
        .collect::<Vec<_>>();
    if attempts.is_empty() {
        return Ok("no logs".to_string());
    }
    Ok(attempts
        .iter()
        .map(render_attempt)
        .collect::<Vec<_>>()
        .join("\n"))
}

fn parse_logs_args(args: &[String]) -> Result<(String, Option<u32>), String> {
    const USAGE: &str = "usage: logs <subtask-id> [--attempt <n>]";
    match args {
        [raw_id] => Ok((raw_id.clone(), None)),
        [raw_id, flag, value] if flag == "--attempt" => {
            let attempt = value
                .parse::<u32>()
                .map_err(|_| format!("invalid attempt `{value}`"))?;
            Ok((raw_id.clone(), Some(attempt)))
        }
        _ => Err(USAGE.to_string()),
    }
}

fn render_attempt(log: &AttemptLog) -> String {
    let heading = match (log.operation, log.run_time, log.started_at.as_deref()) {
        (Some(operation), Some(run_time), Some(started_at)) => {
            format!("== attempt {run_time}: {operation} started_at={started_at} ==")
        }
        _ => "== before first attempt ==".to_string(),
    };
    format!("{heading}\n{}", log.content.trim_end())
}
