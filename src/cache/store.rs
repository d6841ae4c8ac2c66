//! Durable block-result cache
//!
//! The in-memory map sits behind a reader/writer lock. Persistence clones
//! a snapshot under the read lock and writes it after the lock is released,
//! so lookups never wait on storage I/O. Expired block results are pruned
//! once, when the snapshot is loaded.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::entry::{BlockCacheEntry, CacheSnapshot, FileCacheEntry};
use crate::core::errors::{PmlError, Result};

/// Read a snapshot from disk. Missing or malformed data yields an empty map.
pub fn load_snapshot(path: &Path, ttl: Duration) -> CacheSnapshot {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No cache file loaded");
            return CacheSnapshot::new();
        }
    };

    let mut snapshot: CacheSnapshot = match serde_json::from_str(&data) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring malformed cache file");
            return CacheSnapshot::new();
        }
    };

    let pruned: usize = match chrono::Duration::from_std(ttl) {
        Ok(ttl) => {
            let cutoff = Utc::now() - ttl;
            snapshot
                .values_mut()
                .map(|entry| entry.prune_before(cutoff))
                .sum()
        }
        Err(_) => 0,
    };

    info!(
        path = %path.display(),
        documents = snapshot.len(),
        pruned,
        "Cache loaded"
    );
    snapshot
}

/// Write a full snapshot, replacing the previous file atomically
pub async fn save_snapshot(path: &Path, snapshot: &CacheSnapshot) -> Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| PmlError::io("create cache directory", dir, e))?;
    }

    let data = serde_json::to_string_pretty(snapshot)?;
    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, data)
        .await
        .map_err(|e| PmlError::io("write cache", &temp_path, e))?;
    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|e| PmlError::io("replace cache", path, e))?;

    debug!(path = %path.display(), "Cache saved");
    Ok(())
}

/// Process-wide cache of block results, scoped per document path
#[derive(Debug)]
pub struct CacheStore {
    path: PathBuf,
    entries: RwLock<CacheSnapshot>,
    save_lock: Mutex<()>,
}

impl CacheStore {
    /// Load the store backed by `path`, pruning entries older than `ttl`
    pub fn load(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        let path = path.into();
        let entries = load_snapshot(&path, ttl);
        Self {
            path,
            entries: RwLock::new(entries),
            save_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached result for a block of `document`
    pub async fn lookup(&self, document: &Path, checksum: &str) -> Option<BlockCacheEntry> {
        let entries = self.entries.read().await;
        entries.get(document)?.blocks.get(checksum).cloned()
    }

    /// Record a freshly computed block result
    pub async fn insert(&self, document: &Path, entry: BlockCacheEntry) {
        let mut entries = self.entries.write().await;
        entries
            .entry(document.to_path_buf())
            .or_insert_with(|| FileCacheEntry::new(document))
            .blocks
            .insert(entry.checksum.clone(), entry);
    }

    /// Whole-document checksum recorded at the last commit
    pub async fn document_checksum(&self, document: &Path) -> Option<String> {
        let entries = self.entries.read().await;
        entries
            .get(document)
            .map(|entry| entry.checksum.clone())
            .filter(|checksum| !checksum.is_empty())
    }

    /// Record a successful rewrite of `document` along with its final block results
    pub async fn commit_document(
        &self,
        document: &Path,
        checksum: String,
        mod_time: Option<DateTime<Utc>>,
        blocks: Vec<BlockCacheEntry>,
    ) {
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(document.to_path_buf())
            .or_insert_with(|| FileCacheEntry::new(document));
        entry.checksum = checksum;
        entry.mod_time = mod_time;
        for block in blocks {
            entry.blocks.insert(block.checksum.clone(), block);
        }
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> CacheSnapshot {
        self.entries.read().await.clone()
    }

    /// Persist the current state
    pub async fn save(&self) -> Result<()> {
        let _guard = self.save_lock.lock().await;
        let snapshot = self.snapshot().await;
        save_snapshot(&self.path, &snapshot).await
    }
}
