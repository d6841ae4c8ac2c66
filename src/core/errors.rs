use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::parser::ParseError;

/// Unified error type for the processing engine
#[derive(Debug, Error)]
pub enum PmlError {
    /// The document's block structure is malformed
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    /// A block names a directive with no registered executor
    #[error("Unknown directive '{marker}' at line {line}")]
    UnknownDirective { marker: String, line: usize },

    /// The external executor failed for one block
    #[error("Failed to process block {block} of {path}: {source}")]
    Execution {
        path: PathBuf,
        block: usize,
        #[source]
        source: anyhow::Error,
    },

    /// An external call exceeded the configured per-call bound
    #[error("Block {block} of {path} timed out after {timeout:?}")]
    CallTimeout {
        path: PathBuf,
        block: usize,
        timeout: std::time::Duration,
    },

    /// The run context was cancelled
    #[error("Operation was cancelled")]
    Cancelled,

    /// The run context's deadline passed
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// Filesystem errors
    #[error("IO operation failed: {operation} ({path})")]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cache snapshot and artifact header serialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file decoding
    #[error("Config decoding error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A result artifact that does not follow the artifact layout
    #[error("Invalid artifact {name}: {reason}")]
    InvalidArtifact { name: String, reason: String },

    /// Invalid configuration values
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A worker task panicked or was torn down unexpectedly
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PmlError {
    /// Create an IO error tagged with the operation and path involved
    pub fn io(operation: impl Into<String>, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// True for explicit cancellation and for an expired deadline
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// True for errors raised before any external call could be made
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::UnknownDirective { .. })
    }
}

/// Result type alias for PmlError
pub type Result<T> = std::result::Result<T, PmlError>;
