// Library crate - exports shared types and the decision engine

pub mod calendar;
pub mod config;
pub mod engine;
pub mod execution;
pub mod types;

// Re-export commonly used types
pub use config::EngineConfig;
pub use engine::SessionEngine;
pub use types::*;
