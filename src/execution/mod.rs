//! Execution shell: hooks, output capture, size guard and the runner factory.

pub mod factory;
pub mod hooks;
pub mod output;
pub mod size_guard;

pub use factory::RunnerFactory;
pub use hooks::{HookPhase, HookRegistry, LifecycleHook};
pub use output::SubtaskOutput;
pub use size_guard::ContextSizeGuard;
