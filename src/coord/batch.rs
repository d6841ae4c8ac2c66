//! Batch driver: one task per document, sharing the engine's call limit

use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::coord::coordinator::Engine;
use crate::coord::types::BatchReport;
use crate::core::context::RunContext;
use crate::core::errors::{PmlError, Result};

/// Every document with `extension` under `root`, outside engine state areas
pub fn discover_documents(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(PmlError::io(
            "walk sources",
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "source directory not found"),
        ));
    }

    let mut documents = Vec::new();
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !(entry.file_type().is_dir() && entry.file_name() == ".pml"));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == extension)
        {
            documents.push(entry.into_path());
        }
    }

    documents.sort();
    Ok(documents)
}

impl Engine {
    /// Process several documents concurrently
    ///
    /// A failing document never stops its siblings; cancelling `ctx` stops all of them.
    pub async fn process_files<I>(&self, ctx: &RunContext, paths: I) -> BatchReport
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut tasks = JoinSet::new();
        for path in paths {
            let engine = self.clone();
            let ctx = ctx.clone();
            tasks.spawn(async move {
                let outcome = engine.process_file(&ctx, &path).await;
                (path, outcome)
            });
        }

        let mut report = BatchReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(file))) => report.succeeded.push(file),
                Ok((path, Err(e))) => {
                    warn!(path = %path.display(), error = %e, "Document failed");
                    report.failed.push((path, e));
                }
                Err(e) => {
                    error!(error = %e, "Document task panicked");
                    report.panicked += 1;
                }
            }
        }

        report.succeeded.sort_by(|a, b| a.path.cmp(&b.path));
        report.failed.sort_by(|a, b| a.0.cmp(&b.0));
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            executed = report.executed(),
            "Batch finished"
        );
        report
    }

    /// Discover and process every document under the configured source tree
    pub async fn process_tree(&self, ctx: &RunContext) -> Result<BatchReport> {
        let config = self.config();
        let documents = discover_documents(&config.sources_dir, &config.document_extension)?;
        info!(
            root = %config.sources_dir.display(),
            documents = documents.len(),
            "Processing source tree"
        );
        Ok(self.process_files(ctx, documents).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discovery_skips_state_areas() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("notes/.pml/results")).unwrap();
        std::fs::create_dir_all(root.join(".pml")).unwrap();
        std::fs::write(root.join("a.pml"), "").unwrap();
        std::fs::write(root.join("notes/b.pml"), "").unwrap();
        std::fs::write(root.join("notes/readme.md"), "").unwrap();
        std::fs::write(root.join("notes/.pml/results/ask_calm_river.pml"), "").unwrap();
        std::fs::write(root.join(".pml/stray.pml"), "").unwrap();

        let found = discover_documents(root, "pml").unwrap();
        assert_eq!(found, vec![root.join("a.pml"), root.join("notes/b.pml")]);
    }

    #[test]
    fn test_discovery_requires_directory() {
        let dir = TempDir::new().unwrap();
        let err = discover_documents(&dir.path().join("missing"), "pml").unwrap_err();
        assert!(matches!(err, PmlError::Io { .. }));
    }
}
