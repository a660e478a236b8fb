use super::cancel::{OnceCallback, UnitOfWork};
use super::queue::{TimeoutHandle, TimeoutNode, TimeoutQueue};
use crate::config::DEFAULT_WATCHDOG_IDLE_TIMEOUT;
use crate::shared::ids::SubtaskId;
use crate::shared::logging::EngineLog;
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

const WATCHDOG_THREAD_NAME: &str = "subtask-timeout-watchdog";

/// Lifecycle of the watchdog thread. Only ever changed under the queue lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogPhase {
    Stopped,
    Starting,
    Running,
    Stopping,
}

struct WatchdogState {
    queue: TimeoutQueue,
    phase: WatchdogPhase,
    generation: u64,
    next_seq: u64,
}

struct Shared {
    state: Mutex<WatchdogState>,
    wakeup: Condvar,
    idle_timeout: Duration,
    log: EngineLog,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, WatchdogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Countdown registry bounding asynchronous waits.
///
/// One lazily started thread serves the whole queue. It parks on a condvar
/// until the earliest deadline, fires expired units outside the lock and exits
/// after `idle_timeout` with nothing queued. The next registration starts a
/// fresh thread.
#[derive(Clone)]
pub struct TimeoutWatchdog {
    shared: Arc<Shared>,
}

impl TimeoutWatchdog {
    pub fn new(idle_timeout: Duration, log: EngineLog) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(WatchdogState {
                    queue: TimeoutQueue::new(),
                    phase: WatchdogPhase::Stopped,
                    generation: 0,
                    next_seq: 0,
                }),
                wakeup: Condvar::new(),
                idle_timeout,
                log,
            }),
        }
    }

    /// Process-wide instance with the default idle timeout.
    pub fn global() -> &'static TimeoutWatchdog {
        static GLOBAL: OnceLock<TimeoutWatchdog> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            TimeoutWatchdog::new(DEFAULT_WATCHDOG_IDLE_TIMEOUT, EngineLog::disabled())
        })
    }

    pub fn idle_timeout(&self) -> Duration {
        self.shared.idle_timeout
    }

    /// Queues `unit` to be cancelled once `timeout` elapses. Timeouts too
    /// large to represent are treated as effectively unbounded.
    pub fn register(
        &self,
        id: SubtaskId,
        unit: Arc<dyn UnitOfWork>,
        timeout: Duration,
    ) -> TimeoutHandle {
        let now = Instant::now();
        let mut state = self.shared.lock();
        state.next_seq += 1;
        let handle = TimeoutHandle {
            id,
            seq: state.next_seq,
        };
        state.queue.insert(TimeoutNode::new(handle, unit, timeout, now));
        match state.phase {
            WatchdogPhase::Stopped => self.start_thread(&mut state),
            WatchdogPhase::Stopping => {
                // The thread has not observed the stop request yet; keep it.
                state.phase = WatchdogPhase::Running;
                self.shared.wakeup.notify_all();
            }
            WatchdogPhase::Starting | WatchdogPhase::Running => {
                self.shared.wakeup.notify_all();
            }
        }
        handle
    }

    pub fn register_fn<F>(&self, id: SubtaskId, timeout: Duration, callback: F) -> TimeoutHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.register(id, Arc::new(OnceCallback::new(callback)), timeout)
    }

    /// Removes the first wait registered under `id`. Returns whether one was
    /// still queued; `false` means it already fired or never existed.
    pub fn cancel(&self, id: SubtaskId) -> bool {
        let removed = {
            let mut state = self.shared.lock();
            state.queue.remove(id)
        };
        removed.is_some()
    }

    /// Withdraws one specific registration. `false` once it has fired.
    pub fn cancel_handle(&self, handle: TimeoutHandle) -> bool {
        let removed = {
            let mut state = self.shared.lock();
            state.queue.remove_handle(handle)
        };
        removed.is_some()
    }

    /// Fires every wait still queued under `id` right away, outside the lock,
    /// and returns how many there were. Used to abort work in flight when the
    /// subtask is cancelled.
    pub fn interrupt(&self, id: SubtaskId) -> usize {
        let interrupted = {
            let mut state = self.shared.lock();
            state.queue.remove_all(id)
        };
        let count = interrupted.len();
        fire(&self.shared.log, interrupted, "watchdog.interrupted");
        count
    }

    pub fn pending(&self) -> usize {
        self.shared.lock().queue.len()
    }

    pub fn deadlines(&self) -> Vec<Instant> {
        self.shared.lock().queue.deadlines()
    }

    pub fn phase(&self) -> WatchdogPhase {
        self.shared.lock().phase
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self.phase(),
            WatchdogPhase::Starting | WatchdogPhase::Running
        )
    }

    /// Number of watchdog threads started over this instance's lifetime.
    pub fn generation(&self) -> u64 {
        self.shared.lock().generation
    }

    /// Drops every queued wait without firing it and asks the thread to exit.
    pub fn shutdown(&self) -> usize {
        let mut state = self.shared.lock();
        let dropped = state.queue.clear();
        if matches!(
            state.phase,
            WatchdogPhase::Starting | WatchdogPhase::Running
        ) {
            state.phase = WatchdogPhase::Stopping;
        }
        self.shared.wakeup.notify_all();
        dropped
    }

    fn start_thread(&self, state: &mut WatchdogState) {
        state.phase = WatchdogPhase::Starting;
        state.generation += 1;
        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name(WATCHDOG_THREAD_NAME.to_string())
            .spawn(move || watch(shared));
        if let Err(err) = spawned {
            state.phase = WatchdogPhase::Stopped;
            self.shared.log.error(
                "watchdog.spawn_failed",
                &err.to_string(),
                &[("pending", Value::from(state.queue.len()))],
            );
        }
    }
}

impl std::fmt::Debug for TimeoutWatchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("TimeoutWatchdog")
            .field("phase", &state.phase)
            .field("pending", &state.queue.len())
            .field("idle_timeout", &self.shared.idle_timeout)
            .finish()
    }
}

fn watch(shared: Arc<Shared>) {
    let mut state = shared.lock();
    if state.phase == WatchdogPhase::Starting {
        state.phase = WatchdogPhase::Running;
    }

    loop {
        if state.phase == WatchdogPhase::Stopping {
            state.phase = WatchdogPhase::Stopped;
            return;
        }

        let now = Instant::now();
        let expired = state.queue.pop_expired(now);
        if !expired.is_empty() {
            drop(state);
            fire(&shared.log, expired, "watchdog.expired");
            state = shared.lock();
            continue;
        }

        match state.queue.next_deadline() {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(now);
                state = shared
                    .wakeup
                    .wait_timeout(state, wait)
                    .map(|(guard, _)| guard)
                    .unwrap_or_else(|poisoned| poisoned.into_inner().0);
            }
            None => {
                let (guard, timed_out) = match shared.wakeup.wait_timeout(state, shared.idle_timeout)
                {
                    Ok((guard, result)) => (guard, result.timed_out()),
                    Err(poisoned) => {
                        let (guard, result) = poisoned.into_inner();
                        (guard, result.timed_out())
                    }
                };
                state = guard;
                if timed_out && state.queue.is_empty() && state.phase == WatchdogPhase::Running {
                    state.phase = WatchdogPhase::Stopped;
                    return;
                }
            }
        }
    }
}

fn fire(log: &EngineLog, nodes: Vec<TimeoutNode>, event: &str) {
    for node in nodes {
        let id = node.id;
        let outcome = catch_unwind(AssertUnwindSafe(|| node.unit.cancel()));
        match outcome {
            Ok(()) => log.info(
                event,
                "unit of work cancelled",
                &[
                    ("subtask_id", Value::from(id.get())),
                    ("timeout_ms", Value::from(node.timeout.as_millis() as u64)),
                ],
            ),
            Err(panic) => log.error(
                "watchdog.callback_panicked",
                &panic_message(&*panic),
                &[("subtask_id", Value::from(id.get()))],
            ),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
