//! Generic countdown facility for bounding asynchronous waits.

pub mod cancel;
pub mod queue;
pub mod watchdog;

pub use cancel::{CancelToken, UnitOfWork};
pub use queue::{TimeoutHandle, TimeoutNode, TimeoutQueue};
pub use watchdog::{TimeoutWatchdog, WatchdogPhase};
