use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Cached result for one block, keyed by its checksum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockCacheEntry {
    pub checksum: String,
    pub result: String,
    pub updated_at: DateTime<Utc>,
    /// Artifact this result was materialized to, once the document was committed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

impl BlockCacheEntry {
    pub fn new(checksum: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            checksum: checksum.into(),
            result: result.into(),
            updated_at: Utc::now(),
            artifact: None,
        }
    }

    pub fn with_artifact(mut self, artifact: Option<String>) -> Self {
        self.artifact = artifact;
        self
    }
}

/// Cache state for one source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileCacheEntry {
    pub path: PathBuf,
    /// Whole-document checksum of the text as last committed
    pub checksum: String,
    pub mod_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub blocks: HashMap<String, BlockCacheEntry>,
}

impl FileCacheEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            checksum: String::new(),
            mod_time: None,
            blocks: HashMap::new(),
        }
    }

    /// Drop block results last updated before `cutoff`; returns how many were dropped
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.blocks.len();
        self.blocks.retain(|_, block| block.updated_at >= cutoff);
        before - self.blocks.len()
    }
}

/// Full persisted cache: document path to its entry
pub type CacheSnapshot = HashMap<PathBuf, FileCacheEntry>;
