pub mod errors;
pub mod ids;
pub mod logging;
pub mod serde_ext;
pub mod time;

pub use errors::EngineError;
pub use ids::{NodeType, SeriesId, SubtaskId, TraceId};
pub use logging::EngineLog;
