use super::time::now_millis;
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn engine_log_path(state_root: &Path) -> PathBuf {
    state_root.join("logs/engine.log")
}

/// JSON-lines engine log. Write failures are dropped on the floor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineLog {
    path: Option<PathBuf>,
}

impl EngineLog {
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn for_state_root(state_root: &Path) -> Self {
        Self::to_file(engine_log_path(state_root))
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn info(&self, event: &str, message: &str, fields: &[(&str, Value)]) {
        self.append("info", event, message, fields);
    }

    pub fn warn(&self, event: &str, message: &str, fields: &[(&str, Value)]) {
        self.append("warn", event, message, fields);
    }

    pub fn error(&self, event: &str, message: &str, fields: &[(&str, Value)]) {
        self.append("error", event, message, fields);
    }

    fn append(&self, level: &str, event: &str, message: &str, fields: &[(&str, Value)]) {
        let Some(path) = self.path.as_ref() else {
            return;
        };

        let mut payload = Map::new();
        payload.insert("timestamp".to_string(), Value::from(now_millis()));
        payload.insert("level".to_string(), Value::String(level.to_string()));
        payload.insert("event".to_string(), Value::String(event.to_string()));
        payload.insert("message".to_string(), Value::String(message.to_string()));
        for (key, value) in fields {
            payload.insert((*key).to_string(), value.clone());
        }

        let Ok(line) = serde_json::to_string(&payload) else {
            return;
        };
        if let Some(parent) = path.parent() {
            if fs::create_dir_all(parent).is_err() {
                return;
            }
        }
        let Ok(mut file) = fs::OpenOptions::new().create(true).append(true).open(path) else {
            return;
        };
        let _ = writeln!(file, "{line}");
    }
}
