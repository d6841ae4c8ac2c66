//! Result artifacts: naming, on-disk layout and document rewriting

pub mod artifact;
pub mod materializer;
pub mod names;

pub use artifact::{is_ephemeral, list_ephemeral_artifacts, ResultArtifact};
pub use materializer::{splice, BlockResult, Materialized, Materializer, Placement};
pub use names::{NameRegistry, ARTIFACT_EXTENSION, NAME_SPACE};
