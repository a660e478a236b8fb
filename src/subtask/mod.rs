pub mod instance;
pub mod state;

pub use instance::SubtaskInstance;
pub use state::{Operation, SubtaskState};
