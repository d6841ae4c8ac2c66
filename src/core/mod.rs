// Core infrastructure shared by the parser, cache, coordinator and materializer

pub mod config;
pub mod context;
pub mod errors;
pub mod telemetry;

// Re-export commonly used types
pub use config::{EngineConfig, EngineConfigBuilder};
pub use context::RunContext;
pub use errors::{PmlError, Result};
pub use telemetry::init_tracing;
