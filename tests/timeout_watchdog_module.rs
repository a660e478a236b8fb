use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use subtask_engine::shared::{EngineLog, SubtaskId};
use subtask_engine::timeout::{CancelToken, TimeoutWatchdog, UnitOfWork};

struct AgentCallbackWait {
    abandoned: AtomicUsize,
}

impl UnitOfWork for AgentCallbackWait {
    fn cancel(&self) {
        self.abandoned.fetch_add(1, Ordering::SeqCst);
    }
}

fn is_sorted(deadlines: &[Instant]) -> bool {
    deadlines.windows(2).all(|pair| pair[0] <= pair[1])
}

#[test]
fn queue_stays_sorted_across_registers_and_cancels() {
    let watchdog = TimeoutWatchdog::new(Duration::from_secs(5), EngineLog::disabled());
    let durations = [40, 10, 25, 60, 10, 5, 33, 50];
    for (idx, secs) in durations.iter().enumerate() {
        watchdog.register(
            SubtaskId(idx as i64),
            Arc::new(CancelToken::new()),
            Duration::from_secs(*secs),
        );
        assert!(is_sorted(&watchdog.deadlines()));
    }

    for id in [3, 0, 5, 42] {
        watchdog.cancel(SubtaskId(id));
        assert!(is_sorted(&watchdog.deadlines()));
    }
    assert_eq!(watchdog.pending(), 5);
    assert_eq!(watchdog.shutdown(), 5);
}

#[test]
fn expiry_cancels_the_registered_unit_once() {
    let watchdog = TimeoutWatchdog::new(Duration::from_secs(5), EngineLog::disabled());
    let wait = Arc::new(AgentCallbackWait {
        abandoned: AtomicUsize::new(0),
    });
    watchdog.register(SubtaskId(1), wait.clone(), Duration::from_millis(50));

    thread::sleep(Duration::from_millis(200));
    assert_eq!(wait.abandoned.load(Ordering::SeqCst), 1);
    assert_eq!(watchdog.pending(), 0);
}

#[test]
fn register_then_cancel_never_fires() {
    let watchdog = TimeoutWatchdog::new(Duration::from_secs(5), EngineLog::disabled());
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    watchdog.register_fn(SubtaskId(2), Duration::from_millis(50), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert!(watchdog.cancel(SubtaskId(2)));

    thread::sleep(Duration::from_millis(200));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn idle_watchdog_restarts_for_new_work() {
    let watchdog = TimeoutWatchdog::new(Duration::from_millis(30), EngineLog::disabled());
    let first = CancelToken::new();
    watchdog.register(SubtaskId(1), Arc::new(first.clone()), Duration::from_millis(5));
    thread::sleep(Duration::from_millis(300));
    assert!(first.is_cancelled());
    assert!(!watchdog.is_running());

    let second = CancelToken::new();
    watchdog.register(SubtaskId(2), Arc::new(second.clone()), Duration::from_millis(5));
    thread::sleep(Duration::from_millis(200));
    assert!(second.is_cancelled());
    assert_eq!(watchdog.generation(), 2);
}

#[test]
fn global_watchdog_is_shared() {
    let a = TimeoutWatchdog::global();
    let b = TimeoutWatchdog::global();
    assert!(std::ptr::eq(a, b));
    assert_eq!(a.idle_timeout(), Duration::from_secs(120));

    let token = CancelToken::new();
    a.register(SubtaskId(9_001), Arc::new(token.clone()), Duration::from_secs(60));
    assert!(b.cancel(SubtaskId(9_001)));
    assert!(!token.is_cancelled());
}
