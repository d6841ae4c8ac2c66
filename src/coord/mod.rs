//! Coordination: executor seam, dispatch registry, per-document engine and batch driver

pub mod action;
pub mod batch;
pub mod coordinator;
pub mod registry;
pub mod types;

pub use action::*;
pub use batch::discover_documents;
pub use coordinator::Engine;
pub use registry::*;
pub use types::*;
