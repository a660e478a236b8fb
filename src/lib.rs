pub mod accessor;
pub mod app;
pub mod config;
pub mod context;
pub mod execution;
pub mod logs;
pub mod runner;
pub mod shared;
pub mod subtask;
pub mod timeout;
