use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Work that can be told to stop. Invoked by the watchdog on expiry and by
/// runners on CANCEL.
pub trait UnitOfWork: Send + Sync {
    fn cancel(&self);
}

/// Shared flag a waiting runner polls.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl UnitOfWork for CancelToken {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

/// Runs a closure at most once.
pub(crate) struct OnceCallback<F> {
    callback: Mutex<Option<F>>,
}

impl<F> OnceCallback<F>
where
    F: FnOnce() + Send,
{
    pub(crate) fn new(callback: F) -> Self {
        Self {
            callback: Mutex::new(Some(callback)),
        }
    }
}

impl<F> UnitOfWork for OnceCallback<F>
where
    F: FnOnce() + Send,
{
    fn cancel(&self) {
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(callback) = callback {
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn token_clones_share_state() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn once_callback_fires_a_single_time() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let unit = OnceCallback::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        unit.cancel();
        unit.cancel();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
