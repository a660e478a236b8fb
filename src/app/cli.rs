#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    Show,
    Logs,
    Config,
    Help,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "show" => CliVerb::Show,
        "logs" => CliVerb::Logs,
        "config" => CliVerb::Config,
        "help" | "--help" | "-h" => CliVerb::Help,
        _ => CliVerb::Unknown,
    }
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Commands:".to_string(),
        "  show <subtask-id>                    Print the persisted subtask instance as JSON"
            .to_string(),
        "  logs <subtask-id> [--attempt <n>]    Print the subtask log stream split by attempt"
            .to_string(),
        "  config                               Show the effective engine settings".to_string(),
        "  help                                 Show this help".to_string(),
    ]
}

pub(crate) fn help_text() -> String {
    let mut lines = cli_help_lines();
    lines.push(String::new());
    lines.push(format!(
        "Settings are read from ${} or ~/.subtask-engine/engine.yaml.",
        crate::config::CONFIG_PATH_ENV
    ));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_parse_and_unknown_falls_through() {
        assert_eq!(parse_cli_verb("show"), CliVerb::Show);
        assert_eq!(parse_cli_verb("--help"), CliVerb::Help);
        assert_eq!(parse_cli_verb("start"), CliVerb::Unknown);
    }

    #[test]
    fn help_mentions_every_verb() {
        let help = help_text();
        for verb in ["show", "logs", "config", "help"] {
            assert!(help.contains(&format!("  {verb}")), "missing {verb}");
        }
    }
}
