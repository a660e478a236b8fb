use super::repository::{RepositoryError, SubtaskRepository};
use crate::context::Context;
use crate::logs::SubtaskLogEntry;
use crate::shared::ids::{NodeType, SeriesId, SubtaskId};
use crate::shared::time::now_millis;
use crate::subtask::{Operation, SubtaskInstance, SubtaskState};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::fs;
use std::path::{Path, PathBuf};

pub struct SqliteSubtaskRepository {
    db_path: PathBuf,
}

impl SqliteSubtaskRepository {
    pub fn open(db_path: &Path) -> Result<Self, RepositoryError> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent).map_err(|source| RepositoryError::CreateParent {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        // Fail fast on an unusable path.
        let _ = repo.connect()?;
        Ok(repo)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection, RepositoryError> {
        let connection =
            Connection::open(&self.db_path).map_err(|source| RepositoryError::Open {
                path: self.db_path.display().to_string(),
                source,
            })?;
        connection.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        Ok(connection)
    }
}

impl SubtaskRepository for SqliteSubtaskRepository {
    fn ensure_schema(&self) -> Result<(), RepositoryError> {
        let connection = self.connect()?;
        connection.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS subtask_instances (
                id INTEGER PRIMARY KEY,
                series_id INTEGER NOT NULL,
                node_type TEXT NOT NULL,
                state TEXT NOT NULL,
                operation TEXT NOT NULL,
                context TEXT NOT NULL,
                run_time INTEGER NOT NULL,
                start_time INTEGER,
                end_time INTEGER,
                parallel_idx INTEGER,
                upstreams TEXT NOT NULL,
                downstreams TEXT NOT NULL,
                prohibit_rollback INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS subtask_logs (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                subtask_id INTEGER NOT NULL,
                run_time INTEGER NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_subtask_instances_series
                ON subtask_instances(series_id);
            CREATE INDEX IF NOT EXISTS idx_subtask_logs_subtask
                ON subtask_logs(subtask_id, seq);
            ",
        )?;
        Ok(())
    }

    fn insert(&self, instance: &SubtaskInstance) -> Result<(), RepositoryError> {
        let mut connection = self.connect()?;
        let tx = connection.transaction()?;
        write_instance(&tx, instance, "")?;
        tx.commit()?;
        Ok(())
    }

    fn load(&self, subtask_id: SubtaskId) -> Result<Option<SubtaskInstance>, RepositoryError> {
        let connection = self.connect()?;
        let raw = connection
            .query_row(
                "
                SELECT id, series_id, node_type, state, operation, context, run_time,
                       start_time, end_time, parallel_idx, upstreams, downstreams,
                       prohibit_rollback
                FROM subtask_instances
                WHERE id = ?1
                ",
                params![subtask_id.get()],
                RawInstance::from_row,
            )
            .optional()?;
        raw.map(RawInstance::decode).transpose()
    }

    fn persist_transition(
        &self,
        instance: &SubtaskInstance,
        terminal_entry: Option<&SubtaskLogEntry>,
    ) -> Result<(), RepositoryError> {
        let mut connection = self.connect()?;
        let tx = connection.transaction()?;
        write_instance(
            &tx,
            instance,
            "
            ON CONFLICT(id) DO UPDATE SET
                state = excluded.state,
                operation = excluded.operation,
                context = excluded.context,
                run_time = excluded.run_time,
                start_time = excluded.start_time,
                end_time = excluded.end_time,
                prohibit_rollback = excluded.prohibit_rollback,
                updated_at = excluded.updated_at
            ",
        )?;
        if let Some(entry) = terminal_entry {
            insert_log(&tx, entry)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn append_log(&self, entry: &SubtaskLogEntry) -> Result<(), RepositoryError> {
        let mut connection = self.connect()?;
        let tx = connection.transaction()?;
        insert_log(&tx, entry)?;
        tx.commit()?;
        Ok(())
    }

    fn load_logs(&self, subtask_id: SubtaskId) -> Result<Vec<SubtaskLogEntry>, RepositoryError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "
            SELECT subtask_id, run_time, content, created_at
            FROM subtask_logs
            WHERE subtask_id = ?1
            ORDER BY seq ASC
            ",
        )?;
        let rows = statement.query_map(params![subtask_id.get()], |row| {
            Ok(SubtaskLogEntry {
                subtask_id: SubtaskId(row.get(0)?),
                run_time: row.get(1)?,
                content: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

fn write_instance(
    tx: &Transaction<'_>,
    instance: &SubtaskInstance,
    on_conflict: &str,
) -> Result<(), RepositoryError> {
    let row = EncodedInstance::encode(instance)?;
    let sql = format!(
        "
        INSERT INTO subtask_instances (
            id, series_id, node_type, state, operation, context, run_time,
            start_time, end_time, parallel_idx, upstreams, downstreams,
            prohibit_rollback, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        {on_conflict}
        "
    );
    tx.execute(
        &sql,
        params![
            instance.id.get(),
            instance.series_id.get(),
            instance.node_type.as_str(),
            instance.state.as_str(),
            instance.operation.as_str(),
            row.context,
            instance.run_time,
            instance.start_time,
            instance.end_time,
            row.parallel_idx,
            row.upstreams,
            row.downstreams,
            instance.prohibit_rollback,
            now_millis(),
        ],
    )?;
    Ok(())
}

fn insert_log(tx: &Transaction<'_>, entry: &SubtaskLogEntry) -> Result<(), RepositoryError> {
    tx.execute(
        "
        INSERT INTO subtask_logs (subtask_id, run_time, content, created_at)
        VALUES (?1, ?2, ?3, ?4)
        ",
        params![
            entry.subtask_id.get(),
            entry.run_time,
            entry.content,
            entry.created_at
        ],
    )?;
    Ok(())
}

struct EncodedInstance {
    context: String,
    upstreams: String,
    downstreams: String,
    parallel_idx: Option<i64>,
}

impl EncodedInstance {
    fn encode(instance: &SubtaskInstance) -> Result<Self, RepositoryError> {
        let encode_err = |field: &'static str| {
            move |source: serde_json::Error| RepositoryError::Encode {
                subtask_id: instance.id,
                field,
                source,
            }
        };
        Ok(Self {
            context: instance.context.to_json().map_err(encode_err("context"))?,
            upstreams: serde_json::to_string(&instance.upstreams)
                .map_err(encode_err("upstreams"))?,
            downstreams: serde_json::to_string(&instance.downstreams)
                .map_err(encode_err("downstreams"))?,
            parallel_idx: instance.parallel_idx.map(|idx| idx as i64),
        })
    }
}

struct RawInstance {
    id: i64,
    series_id: i64,
    node_type: String,
    state: String,
    operation: String,
    context: String,
    run_time: u32,
    start_time: Option<i64>,
    end_time: Option<i64>,
    parallel_idx: Option<i64>,
    upstreams: String,
    downstreams: String,
    prohibit_rollback: bool,
}

impl RawInstance {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            series_id: row.get(1)?,
            node_type: row.get(2)?,
            state: row.get(3)?,
            operation: row.get(4)?,
            context: row.get(5)?,
            run_time: row.get(6)?,
            start_time: row.get(7)?,
            end_time: row.get(8)?,
            parallel_idx: row.get(9)?,
            upstreams: row.get(10)?,
            downstreams: row.get(11)?,
            prohibit_rollback: row.get(12)?,
        })
    }

    fn decode(self) -> Result<SubtaskInstance, RepositoryError> {
        let subtask_id = SubtaskId(self.id);
        let invalid = |message: String| RepositoryError::Decode {
            subtask_id,
            message,
        };

        let node_type = NodeType::parse(&self.node_type).map_err(invalid)?;
        let state = SubtaskState::parse(&self.state).map_err(invalid)?;
        let operation = Operation::parse(&self.operation).map_err(invalid)?;
        let context = Context::from_json(&self.context)
            .map_err(|err| invalid(format!("context: {err}")))?;
        let upstreams: Vec<SubtaskId> = serde_json::from_str(&self.upstreams)
            .map_err(|err| invalid(format!("upstreams: {err}")))?;
        let downstreams: Vec<SubtaskId> = serde_json::from_str(&self.downstreams)
            .map_err(|err| invalid(format!("downstreams: {err}")))?;
        let parallel_idx = self
            .parallel_idx
            .map(|idx| usize::try_from(idx).map_err(|_| invalid(format!("parallel_idx {idx}"))))
            .transpose()?;

        Ok(SubtaskInstance {
            id: subtask_id,
            series_id: SeriesId(self.series_id),
            node_type,
            state,
            operation,
            context,
            run_time: self.run_time,
            start_time: self.start_time,
            end_time: self.end_time,
            parallel_idx,
            upstreams,
            downstreams,
            prohibit_rollback: self.prohibit_rollback,
        })
    }
}
