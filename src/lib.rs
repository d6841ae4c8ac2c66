//! Incremental directive-block processing for `.pml` documents
//!
//! Documents carry delimited blocks (`:ask` / `:do` ... `:--`). The engine
//! sends each block's content to an external executor, stores the answer as
//! a result artifact, and replaces the block with a reference annotation.
//! Results are cached per document and block checksum, so unchanged blocks
//! are never executed twice.

// Core infrastructure modules
pub mod core;

pub mod cache;   // Durable block-result cache
pub mod coord;   // Executors, engine and batch driver
pub mod parser;  // Block scanning and checksums
pub mod results; // Artifact naming, layout and splicing

// Re-exports for convenience
pub use cache::{BlockCacheEntry, CacheStore, FileCacheEntry};
pub use coord::{
    discover_documents, BatchReport, DirectiveExecutor, EchoExecutor, Engine, ExecutorRegistry,
    FileReport, ProcessingJob,
};
pub use core::{init_tracing, EngineConfig, EngineConfigBuilder, PmlError, Result, RunContext};
pub use parser::{
    annotation, annotation_target, block_checksum, document_checksum, parse_blocks, Block,
    DirectiveKind, ParseError,
};
pub use results::{is_ephemeral, list_ephemeral_artifacts, ResultArtifact};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_echo_engine() {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join("echo.pml");
        std::fs::write(&doc, "head\n:do\nsay hello\n:--\n").unwrap();

        let config = EngineConfig::builder().sources_dir(dir.path()).build().unwrap();
        let engine = Engine::with_executor(config, Arc::new(EchoExecutor)).unwrap();
        let report = engine.process_file(&RunContext::new(), &doc).await.unwrap();

        assert_eq!(report.executed, 1);
        let rewritten = std::fs::read_to_string(&doc).unwrap();
        let name = rewritten.lines().nth(1).and_then(annotation_target).unwrap();
        let artifact =
            ResultArtifact::read(&dir.path().join(".pml/results").join(name)).unwrap();
        assert_eq!(artifact.kind, DirectiveKind::Do);
        assert_eq!(artifact.answer, "say hello");
    }
}
