use super::hooks::{HookPhase, HookRegistry, LifecycleHook};
use super::output::SubtaskOutput;
use super::size_guard::ContextSizeGuard;
use crate::accessor::{SqliteSubtaskRepository, SubtaskAccessor, SubtaskRepository};
use crate::config::{bootstrap_state_root, EngineSettings};
use crate::context::keys;
use crate::logs::{separator, SubtaskLogEntry};
use crate::runner::{
    check_precondition, run_operation, ExecutionScope, OperationOutcome, SubtaskRunner,
};
use crate::shared::errors::EngineError;
use crate::shared::ids::{NodeType, TraceId};
use crate::shared::logging::EngineLog;
use crate::shared::time::now_millis;
use crate::subtask::SubtaskInstance;
use crate::timeout::TimeoutWatchdog;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// The execution shell around every runner invocation.
pub struct RunnerFactory {
    runners: HashMap<NodeType, Arc<dyn SubtaskRunner>>,
    hooks: HookRegistry,
    accessor: Arc<SubtaskAccessor>,
    size_guard: ContextSizeGuard,
    watchdog: TimeoutWatchdog,
    state_root: PathBuf,
    persist_running_transition: bool,
    log: EngineLog,
}

impl RunnerFactory {
    pub fn new(
        settings: &EngineSettings,
        accessor: Arc<SubtaskAccessor>,
        watchdog: TimeoutWatchdog,
        log: EngineLog,
    ) -> Self {
        Self {
            runners: HashMap::new(),
            hooks: HookRegistry::new(),
            accessor,
            size_guard: ContextSizeGuard::new(settings.context_size_limit_bytes),
            watchdog,
            state_root: settings.state_root.clone(),
            persist_running_transition: settings.persist_running_transition,
            log,
        }
    }

    /// Bootstraps the state root and wires the SQLite store, the engine log
    /// and a watchdog with the configured idle timeout.
    pub fn from_settings(settings: &EngineSettings) -> Result<Self, EngineError> {
        settings.validate()?;
        let paths = settings.paths();
        bootstrap_state_root(&paths)?;

        let log = EngineLog::to_file(paths.engine_log_path());
        let repository = SqliteSubtaskRepository::open(&paths.database_path())?;
        repository.ensure_schema()?;
        let accessor = Arc::new(SubtaskAccessor::new(Arc::new(repository), log.clone()));
        let watchdog = TimeoutWatchdog::new(settings.watchdog_idle_timeout, log.clone());
        Ok(Self::new(settings, accessor, watchdog, log))
    }

    pub fn register(
        &mut self,
        node_type: NodeType,
        runner: Arc<dyn SubtaskRunner>,
    ) -> Result<(), EngineError> {
        if self.runners.contains_key(&node_type) {
            return Err(EngineError::DuplicateRunner { node_type });
        }
        self.runners.insert(node_type, runner);
        Ok(())
    }

    pub fn register_hook(&mut self, node_type: NodeType, hook: Arc<dyn LifecycleHook>) {
        self.hooks.register(node_type, hook);
    }

    pub fn accessor(&self) -> &SubtaskAccessor {
        &self.accessor
    }

    pub fn size_guard(&self) -> &ContextSizeGuard {
        &self.size_guard
    }

    pub fn watchdog(&self) -> &TimeoutWatchdog {
        &self.watchdog
    }

    /// Runs `instance.operation` with the runner registered for `node_type`.
    ///
    /// Runner failures come back as a FAILED instance. The only error is a
    /// node type with no registered runner.
    pub fn run(
        &self,
        node_type: &NodeType,
        trace_id: &TraceId,
        instance: SubtaskInstance,
    ) -> Result<SubtaskInstance, EngineError> {
        let Some(runner) = self.runners.get(node_type) else {
            self.log.error(
                "runner.unknown_node_type",
                &format!("no runner registered for node type `{node_type}`"),
                &[
                    ("subtask_id", Value::from(instance.id.get())),
                    ("trace_id", Value::from(trace_id.as_str())),
                ],
            );
            return Err(EngineError::UnknownNodeType {
                node_type: node_type.clone(),
                subtask_id: instance.id,
            });
        };

        if let Err(reason) = check_precondition(&instance) {
            self.log.info(
                "runner.rejected",
                &reason,
                &[
                    ("subtask_id", Value::from(instance.id.get())),
                    ("trace_id", Value::from(trace_id.as_str())),
                    ("operation", Value::from(instance.operation.as_str())),
                    ("state", Value::from(instance.state.as_str())),
                ],
            );
            return Ok(instance);
        }

        let mut working = instance.clone();
        working.context.put(keys::TRACE_ID, trace_id.as_str());
        let started_at = now_millis();
        working.mark_running(started_at);
        if self.persist_running_transition {
            self.accessor.record_transition(&instance, working.clone());
        }
        let running = working.clone();

        let header = separator(working.operation, working.run_time, started_at);
        self.accessor.append_log(&SubtaskLogEntry::new(
            working.id,
            working.run_time,
            header.clone(),
            started_at,
        ));
        self.log.info(
            "runner.started",
            &format!("{} subtask {}", working.operation, working.id),
            &attempt_fields(&working, trace_id),
        );

        self.hooks
            .run(HookPhase::Before, node_type, working.id, &self.log);

        let mut output = match SubtaskOutput::open(
            &self.state_root,
            working.id,
            working.run_time,
            &header,
            &self.accessor,
        ) {
            Ok(output) => output,
            Err(err) => {
                self.log.error(
                    "output.unavailable",
                    &format!("subtask log file unavailable, capturing to the log stream only: {err}"),
                    &attempt_fields(&working, trace_id),
                );
                SubtaskOutput::detached(working.id, working.run_time, &self.accessor)
            }
        };
        let outcome = self.dispatch(runner.as_ref(), &mut working, trace_id, &mut output);
        if let Err(err) = output.close() {
            self.log.warn(
                "output.close_failed",
                &format!("subtask log file is incomplete: {err}"),
                &attempt_fields(&working, trace_id),
            );
        }

        working.finish(outcome.state, now_millis());
        self.hooks
            .run(HookPhase::After, node_type, working.id, &self.log);
        self.size_guard.check(&working, &self.log);

        let mut fields = attempt_fields(&working, trace_id);
        match outcome.error.as_ref() {
            Some(err) => {
                fields.push(("failure_code", Value::from(err.code())));
                self.log.warn("runner.finished", &err.to_string(), &fields);
            }
            None => self.log.info("runner.finished", "ok", &fields),
        }

        Ok(self.accessor.record_transition(&running, working))
    }

    fn dispatch(
        &self,
        runner: &dyn SubtaskRunner,
        working: &mut SubtaskInstance,
        trace_id: &TraceId,
        output: &mut dyn Write,
    ) -> OperationOutcome {
        let mut scope = ExecutionScope::new(
            working.id,
            trace_id,
            working.operation,
            working.run_time,
            output,
            &self.watchdog,
        );
        run_operation(runner, working, &mut scope)
    }
}

fn attempt_fields(instance: &SubtaskInstance, trace_id: &TraceId) -> Vec<(&'static str, Value)> {
    vec![
        ("subtask_id", Value::from(instance.id.get())),
        ("trace_id", Value::from(trace_id.as_str())),
        ("operation", Value::from(instance.operation.as_str())),
        ("state", Value::from(instance.state.as_str())),
        ("run_time", Value::from(instance.run_time)),
    ]
}
