use crate::app::cli::{help_text, parse_cli_verb, CliVerb};
use crate::app::command_support::load_settings;
use crate::config::EngineSettings;

pub mod config;
pub mod subtasks;

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    if args.is_empty() {
        return Ok(help_text());
    }
    if parse_cli_verb(args[0].as_str()) == CliVerb::Help {
        return Ok(help_text());
    }
    let settings = load_settings()?;
    run_cli_with_settings(&settings, &args)
}

/// Dispatch against already-loaded settings.
pub fn run_cli_with_settings(settings: &EngineSettings, args: &[String]) -> Result<String, String> {
    let Some(verb) = args.first() else {
        return Ok(help_text());
    };

    match parse_cli_verb(verb) {
        CliVerb::Show => subtasks::cmd_show(settings, &args[1..]),
        CliVerb::Logs => subtasks::cmd_logs(settings, &args[1..]),
        CliVerb::Config => config::cmd_config(settings),
        CliVerb::Help => Ok(help_text()),
        CliVerb::Unknown => Err(format!("unknown command `{verb}`")),
    }
}
