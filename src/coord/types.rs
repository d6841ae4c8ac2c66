//! Job and report types for one processing run

use std::path::PathBuf;

use crate::cache::BlockCacheEntry;
use crate::core::errors::PmlError;
use crate::results::Placement;

/// Binds a block's index to its eventual result. Lives for one `process_file` call.
#[derive(Debug, Clone)]
pub struct ProcessingJob {
    pub index: usize,
    pub checksum: String,
    /// Result, once known
    pub outcome: Option<BlockCacheEntry>,
    /// Whether the outcome came from the cache rather than an external call
    pub from_cache: bool,
}

impl ProcessingJob {
    pub fn new(index: usize, checksum: String, cached: Option<BlockCacheEntry>) -> Self {
        Self {
            index,
            checksum,
            from_cache: cached.is_some(),
            outcome: cached,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.outcome.is_none()
    }

    pub fn complete(&mut self, entry: BlockCacheEntry) {
        self.outcome = Some(entry);
    }
}

/// Summary of one document run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    /// Blocks answered by an external call
    pub executed: usize,
    /// Blocks answered from the cache
    pub cached: usize,
    /// Artifacts referenced by the rewritten document, in document order.
    /// Inlined blocks have no entry here; see `placements`.
    pub artifacts: Vec<String>,
    /// Where each block's result went, indexed by block position
    pub placements: Vec<Placement>,
    /// Blocks whose result was inlined because its artifact could not be written
    pub inlined: usize,
    /// The document was left alone (unchanged since last run, or not a document)
    pub skipped: bool,
}

impl FileReport {
    pub fn skipped(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            skipped: true,
            ..Default::default()
        }
    }
}

/// Outcome of driving several documents
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<FileReport>,
    pub failed: Vec<(PathBuf, PmlError)>,
    /// Worker tasks that panicked
    pub panicked: usize,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.panicked == 0
    }

    /// Total external calls made across the batch
    pub fn executed(&self) -> usize {
        self.succeeded.iter().map(|report| report.executed).sum()
    }
}
