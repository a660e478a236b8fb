use super::TaskError;
use crate::shared::ids::{SubtaskId, TraceId};
use crate::subtask::Operation;
use crate::timeout::{CancelToken, TimeoutWatchdog};
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// What a runner gets to work with for one attempt.
///
/// `output` is the subtask's own log stream; anything written there ends up
/// in the per-subtask log file and the persisted log entries.
pub struct ExecutionScope<'a> {
    subtask_id: SubtaskId,
    trace_id: &'a TraceId,
    operation: Operation,
    run_time: u32,
    output: &'a mut dyn Write,
    watchdog: &'a TimeoutWatchdog,
}

impl<'a> ExecutionScope<'a> {
    pub fn new(
        subtask_id: SubtaskId,
        trace_id: &'a TraceId,
        operation: Operation,
        run_time: u32,
        output: &'a mut dyn Write,
        watchdog: &'a TimeoutWatchdog,
    ) -> Self {
        Self {
            subtask_id,
            trace_id,
            operation,
            run_time,
            output,
            watchdog,
        }
    }

    pub fn subtask_id(&self) -> SubtaskId {
        self.subtask_id
    }

    pub fn trace_id(&self) -> &TraceId {
        self.trace_id
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn run_time(&self) -> u32 {
        self.run_time
    }

    pub fn output(&mut self) -> &mut dyn Write {
        &mut *self.output
    }

    pub fn watchdog(&self) -> &TimeoutWatchdog {
        self.watchdog
    }

    /// Fires every wait this subtask still has registered, on any thread.
    /// A `bounded_wait` in progress returns `TaskError::Cancelled`.
    pub fn interrupt_waits(&self) -> usize {
        self.watchdog.interrupt(self.subtask_id)
    }

    /// Polls `ready` until it reports true, bounded by a watchdog-enforced
    /// `timeout`. Only this wait's own registration is withdrawn on return.
    pub fn bounded_wait<F>(
        &mut self,
        timeout: Duration,
        poll_interval: Duration,
        mut ready: F,
    ) -> Result<(), TaskError>
    where
        F: FnMut() -> Result<bool, TaskError>,
    {
        let token = CancelToken::new();
        let started = Instant::now();
        let handle = self
            .watchdog
            .register(self.subtask_id, Arc::new(token.clone()), timeout);

        let result = loop {
            match ready() {
                Ok(true) => break Ok(()),
                Ok(false) => {}
                Err(err) => break Err(err),
            }
            if token.is_cancelled() {
                let waited = started.elapsed();
                if waited < timeout {
                    break Err(TaskError::Cancelled);
                }
                break Err(TaskError::Timeout {
                    waited_ms: waited.as_millis() as u64,
                });
            }
            thread::sleep(poll_interval);
        };

        self.watchdog.cancel_handle(handle);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::logging::EngineLog;

    fn trace() -> TraceId {
        TraceId::parse("trace-1").expect("trace id")
    }

    #[test]
    fn bounded_wait_returns_once_ready() {
        let watchdog = TimeoutWatchdog::new(Duration::from_secs(5), EngineLog::disabled());
        let trace = trace();
        let mut sink = Vec::new();
        let mut scope = ExecutionScope::new(
            SubtaskId(5),
            &trace,
            Operation::Execute,
            1,
            &mut sink,
            &watchdog,
        );

        let mut polls = 0;
        scope
            .bounded_wait(Duration::from_secs(5), Duration::from_millis(1), || {
                polls += 1;
                Ok(polls >= 3)
            })
            .expect("ready before timeout");
        assert_eq!(polls, 3);
        assert_eq!(watchdog.pending(), 0);
    }

    #[test]
    fn bounded_wait_times_out_via_watchdog() {
        let watchdog = TimeoutWatchdog::new(Duration::from_secs(5), EngineLog::disabled());
        let trace = trace();
        let mut sink = Vec::new();
        let mut scope = ExecutionScope::new(
            SubtaskId(6),
            &trace,
            Operation::Execute,
            1,
            &mut sink,
            &watchdog,
        );

        let err = scope
            .bounded_wait(Duration::from_millis(30), Duration::from_millis(5), || {
                Ok(false)
            })
            .expect_err("never ready");
        assert!(matches!(err, TaskError::Timeout { waited_ms } if waited_ms >= 30));
        assert_eq!(watchdog.pending(), 0);
    }

    #[test]
    fn timed_out_wait_keeps_the_runners_other_registrations() {
        let watchdog = TimeoutWatchdog::new(Duration::from_secs(5), EngineLog::disabled());
        let trace = trace();
        let mut sink = Vec::new();
        let mut scope = ExecutionScope::new(
            SubtaskId(8),
            &trace,
            Operation::Execute,
            1,
            &mut sink,
            &watchdog,
        );
        let outer = CancelToken::new();
        scope.watchdog().register(
            SubtaskId(8),
            Arc::new(outer.clone()),
            Duration::from_millis(300),
        );

        let err = scope
            .bounded_wait(Duration::from_millis(30), Duration::from_millis(5), || {
                Ok(false)
            })
            .expect_err("never ready");
        assert!(matches!(err, TaskError::Timeout { .. }));
        assert_eq!(watchdog.pending(), 1);

        thread::sleep(Duration::from_millis(500));
        assert!(outer.is_cancelled());
    }

    #[test]
    fn unbounded_wait_still_returns_once_ready() {
        let watchdog = TimeoutWatchdog::new(Duration::from_secs(5), EngineLog::disabled());
        let trace = trace();
        let mut sink = Vec::new();
        let mut scope = ExecutionScope::new(
            SubtaskId(9),
            &trace,
            Operation::Execute,
            1,
            &mut sink,
            &watchdog,
        );

        let mut polls = 0;
        scope
            .bounded_wait(Duration::MAX, Duration::from_millis(1), || {
                polls += 1;
                Ok(polls >= 2)
            })
            .expect("ready");
        assert_eq!(watchdog.pending(), 0);
    }

    #[test]
    fn interrupted_wait_reports_cancellation() {
        let watchdog = TimeoutWatchdog::new(Duration::from_secs(5), EngineLog::disabled());
        let trace = trace();
        let mut sink = Vec::new();
        let mut scope = ExecutionScope::new(
            SubtaskId(10),
            &trace,
            Operation::Execute,
            1,
            &mut sink,
            &watchdog,
        );

        let interrupter = watchdog.clone();
        let mut polls = 0;
        let err = scope
            .bounded_wait(Duration::from_secs(30), Duration::from_millis(1), || {
                polls += 1;
                if polls == 3 {
                    interrupter.interrupt(SubtaskId(10));
                }
                Ok(false)
            })
            .expect_err("interrupted");
        assert_eq!(err, TaskError::Cancelled);
        assert_eq!(watchdog.pending(), 0);
    }

    #[test]
    fn output_goes_to_the_supplied_writer() {
        let watchdog = TimeoutWatchdog::new(Duration::from_secs(5), EngineLog::disabled());
        let trace = trace();
        let mut sink = Vec::new();
        {
            let mut scope = ExecutionScope::new(
                SubtaskId(7),
                &trace,
                Operation::Rollback,
                2,
                &mut sink,
                &watchdog,
            );
            writeln!(scope.output(), "dropping tenant").expect("write");
            assert_eq!(scope.operation(), Operation::Rollback);
            assert_eq!(scope.run_time(), 2);
        }
        assert_eq!(String::from_utf8(sink).expect("utf8"), "dropping tenant\n");
    }
}
