//! Engine - drives one document from source text to rewritten text
//!
//! A run takes the document's exclusive lock, parses it, binds cache hits,
//! fans the remaining blocks out to their executors under the shared call
//! limit, and only then materializes artifacts and rewrites the source.
//! Any failure before the rewrite leaves the source untouched.

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::{BlockCacheEntry, CacheStore};
use crate::coord::action::DirectiveExecutor;
use crate::coord::registry::ExecutorRegistry;
use crate::coord::types::{FileReport, ProcessingJob};
use crate::core::config::EngineConfig;
use crate::core::context::RunContext;
use crate::core::errors::{PmlError, Result};
use crate::parser::{block_checksum, document_checksum, parse_blocks, Block};
use crate::results::{BlockResult, Materializer, Placement};

/// Directory name reserved for engine state and results areas
const STATE_DIR_NAME: &str = ".pml";

struct EngineInner {
    config: EngineConfig,
    registry: ExecutorRegistry,
    cache: CacheStore,
    materializer: Materializer,
    /// Aggregate bound on external calls across every document
    call_limit: Arc<Semaphore>,
    path_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

/// Processing engine owning its cache, name registry and locks
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Build an engine; creates the state directory and loads the cache snapshot
    pub fn new(config: EngineConfig, registry: ExecutorRegistry) -> Result<Self> {
        config.validate()?;

        let state_dir = config.state_dir();
        std::fs::create_dir_all(&state_dir)
            .map_err(|e| PmlError::io("create state directory", &state_dir, e))?;

        let cache = CacheStore::load(config.cache_path(), config.block_ttl());
        info!(
            sources = %config.sources_dir.display(),
            max_concurrent_calls = config.max_concurrent_calls,
            kinds = ?registry.kinds(),
            "Engine ready"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                call_limit: Arc::new(Semaphore::new(config.max_concurrent_calls)),
                config,
                registry,
                cache,
                materializer: Materializer::new(),
                path_locks: DashMap::new(),
            }),
        })
    }

    /// Build an engine where one executor serves every directive kind
    pub fn with_executor(config: EngineConfig, executor: Arc<dyn DirectiveExecutor>) -> Result<Self> {
        Self::new(config, ExecutorRegistry::uniform(executor))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &CacheStore {
        &self.inner.cache
    }

    pub fn materializer(&self) -> &Materializer {
        &self.inner.materializer
    }

    fn path_lock(&self, key: &Path) -> Arc<Mutex<()>> {
        self.inner
            .path_locks
            .entry(key.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Process one document
    ///
    /// Paths inside an engine state area and directories are skipped. On
    /// success the document has been rewritten and its cache entry committed.
    pub async fn process_file(&self, ctx: &RunContext, path: impl AsRef<Path>) -> Result<FileReport> {
        let path = path.as_ref();

        if is_engine_path(path) {
            debug!(path = %path.display(), "Skipping engine-owned file");
            return Ok(FileReport::skipped(path));
        }
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| PmlError::io("stat document", path, e))?;
        if metadata.is_dir() {
            return Ok(FileReport::skipped(path));
        }

        let key = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| PmlError::io("resolve document path", path, e))?;

        if let Some(err) = ctx.err() {
            return Err(err);
        }
        let lock = self.path_lock(&key);
        let outcome = self.process_exclusive(ctx, path, &key, lock).await;
        self.release_path_lock(&key);
        outcome
    }

    /// Wait for the document's lock, then run; the guard drops on return
    async fn process_exclusive(
        &self,
        ctx: &RunContext,
        path: &Path,
        key: &Path,
        lock: Arc<Mutex<()>>,
    ) -> Result<FileReport> {
        let _guard = tokio::select! {
            guard = lock.lock_owned() => guard,
            err = ctx.done() => return Err(err),
        };
        self.process_locked(ctx, path, key).await
    }

    /// Forget a path's lock once no run holds or waits on it
    fn release_path_lock(&self, key: &Path) {
        self.inner
            .path_locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Number of documents with a live lock entry
    pub(crate) fn tracked_paths(&self) -> usize {
        self.inner.path_locks.len()
    }

    async fn process_locked(&self, ctx: &RunContext, path: &Path, key: &Path) -> Result<FileReport> {
        let config = &self.inner.config;
        let cache = &self.inner.cache;

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PmlError::io("read document", path, e))?;
        let checksum = document_checksum(&text);

        if !config.force && cache.document_checksum(key).await.as_deref() == Some(checksum.as_str()) {
            debug!(path = %path.display(), "Document unchanged since last run");
            return Ok(FileReport::skipped(path));
        }

        let blocks = parse_blocks(&text).map_err(|source| PmlError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if blocks.is_empty() {
            let mod_time = modified_at(path).await;
            cache.commit_document(key, checksum, mod_time, Vec::new()).await;
            self.save_cache().await;
            debug!(path = %path.display(), "No blocks to process");
            return Ok(FileReport {
                path: path.to_path_buf(),
                ..Default::default()
            });
        }

        // Every block must be dispatchable before the first call goes out
        let executors = blocks
            .iter()
            .map(|block| self.inner.registry.resolve(block))
            .collect::<Result<Vec<_>>>()?;

        let mut jobs = Vec::with_capacity(blocks.len());
        for (index, block) in blocks.iter().enumerate() {
            let block_sum = block_checksum(block);
            let cached = if config.force {
                None
            } else {
                cache.lookup(key, &block_sum).await
            };
            match &cached {
                Some(_) => debug!(path = %path.display(), block = index, "Cache hit"),
                None => debug!(path = %path.display(), block = index, "Cache miss"),
            }
            jobs.push(ProcessingJob::new(index, block_sum, cached));
        }

        let cached_count = jobs.iter().filter(|job| job.from_cache).count();
        let executed_count = jobs.len() - cached_count;
        info!(
            path = %path.display(),
            blocks = blocks.len(),
            cached = cached_count,
            pending = executed_count,
            "Processing document"
        );

        if let Err(err) = self.run_jobs(ctx, path, key, &blocks, &executors, &mut jobs).await {
            warn!(path = %path.display(), error = %err, "Document run aborted");
            self.save_cache().await;
            return Err(err);
        }

        let results = jobs
            .iter()
            .map(|job| {
                job.outcome
                    .as_ref()
                    .map(|entry| BlockResult {
                        result: entry.result.clone(),
                        artifact: entry.artifact.clone(),
                    })
                    .ok_or_else(|| PmlError::Internal(format!("block {} has no result", job.index)))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(err) = ctx.err() {
            self.save_cache().await;
            return Err(err);
        }

        let results_dir = config.results_dir_for(path);
        let materializer = &self.inner.materializer;
        let materialized = materializer
            .materialize(path, &text, &blocks, &results, &results_dir)
            .await?;

        // Nothing references fresh artifacts until the rewrite lands
        let written = match ctx.err() {
            Some(err) => Err(err),
            None => write_atomically(path, &materialized.text).await,
        };
        if let Err(err) = written {
            warn!(path = %path.display(), error = %err, "Document not rewritten");
            materializer.discard(&materialized).await;
            self.save_cache().await;
            return Err(err);
        }
        let mod_time = modified_at(path).await;

        let entries: Vec<BlockCacheEntry> = jobs
            .into_iter()
            .zip(&materialized.placements)
            .filter_map(|(job, placement)| {
                job.outcome
                    .map(|entry| entry.with_artifact(placement.artifact().map(str::to_string)))
            })
            .collect();
        cache
            .commit_document(key, document_checksum(&materialized.text), mod_time, entries)
            .await;
        self.save_cache().await;

        let artifacts: Vec<String> = materialized
            .placements
            .iter()
            .filter_map(|placement| placement.artifact().map(str::to_string))
            .collect();
        let inlined = materialized
            .placements
            .iter()
            .filter(|placement| **placement == Placement::Inline)
            .count();

        info!(
            path = %path.display(),
            executed = executed_count,
            cached = cached_count,
            inlined,
            "Document rewritten"
        );

        Ok(FileReport {
            path: path.to_path_buf(),
            executed: executed_count,
            cached: cached_count,
            artifacts,
            placements: materialized.placements,
            inlined,
            skipped: false,
        })
    }

    /// Execute every pending job; results land at their own index
    async fn run_jobs(
        &self,
        ctx: &RunContext,
        path: &Path,
        key: &Path,
        blocks: &[Block],
        executors: &[Arc<dyn DirectiveExecutor>],
        jobs: &mut [ProcessingJob],
    ) -> Result<()> {
        let file_ctx = ctx.child();
        let timeout = self.inner.config.call_timeout();
        let mut workers = JoinSet::new();

        for job in jobs.iter().filter(|job| job.is_pending()) {
            let index = job.index;
            let executor = executors[index].clone();
            let content = blocks[index].text();
            let permits = self.inner.call_limit.clone();
            let worker_ctx = file_ctx.clone();
            let path = path.to_path_buf();

            workers.spawn(async move {
                let outcome = call_executor(
                    &worker_ctx,
                    &permits,
                    executor.as_ref(),
                    &content,
                    timeout,
                    &path,
                    index,
                )
                .await;
                (index, outcome)
            });
        }

        let mut first_error = None;
        while !workers.is_empty() {
            let joined = tokio::select! {
                joined = workers.join_next() => joined,
                err = ctx.done() => {
                    first_error = Some(err);
                    break;
                }
            };

            match joined {
                None => break,
                Some(Ok((index, Ok(result)))) => {
                    // Results arriving after cancellation are discarded
                    if let Some(err) = ctx.err() {
                        first_error = Some(err);
                        break;
                    }
                    let entry = BlockCacheEntry::new(jobs[index].checksum.clone(), result);
                    self.inner.cache.insert(key, entry.clone()).await;
                    jobs[index].complete(entry);
                    debug!(path = %path.display(), block = index, "Block completed");
                }
                Some(Ok((index, Err(err)))) => {
                    warn!(path = %path.display(), block = index, error = %err, "Block failed");
                    first_error = Some(err);
                    break;
                }
                Some(Err(join_err)) => {
                    first_error = Some(PmlError::Internal(format!("block worker failed: {}", join_err)));
                    break;
                }
            }
        }

        match first_error {
            Some(err) => {
                file_ctx.cancel();
                workers.abort_all();
                Err(err)
            }
            None => Ok(()),
        }
    }

    async fn save_cache(&self) {
        if let Err(e) = self.inner.cache.save().await {
            warn!(path = %self.inner.cache.path().display(), error = %e, "Failed to save cache");
        }
    }
}

/// One external call: wait for a permit, then run the executor, both racing the context
async fn call_executor(
    ctx: &RunContext,
    permits: &Semaphore,
    executor: &dyn DirectiveExecutor,
    content: &str,
    timeout: Option<Duration>,
    path: &Path,
    index: usize,
) -> Result<String> {
    let _permit = tokio::select! {
        permit = permits.acquire() => permit
            .map_err(|_| PmlError::Internal("call limiter closed".to_string()))?,
        err = ctx.done() => return Err(err),
    };
    if let Some(err) = ctx.err() {
        return Err(err);
    }

    debug!(path = %path.display(), block = index, executor = executor.name(), "Dispatching block");
    let call = executor.execute(ctx, content);
    let outcome = match timeout {
        Some(limit) => tokio::select! {
            res = tokio::time::timeout(limit, call) => res.map_err(|_| PmlError::CallTimeout {
                path: path.to_path_buf(),
                block: index,
                timeout: limit,
            })?,
            err = ctx.done() => return Err(err),
        },
        None => tokio::select! {
            res = call => res,
            err = ctx.done() => return Err(err),
        },
    };

    outcome.map_err(|source| PmlError::Execution {
        path: path.to_path_buf(),
        block: index,
        source,
    })
}

/// Whether `path` lives inside an engine state or results area
pub(crate) fn is_engine_path(path: &Path) -> bool {
    path.parent()
        .is_some_and(|dir| dir.components().any(|c| c.as_os_str() == STATE_DIR_NAME))
}

async fn modified_at(path: &Path) -> Option<chrono::DateTime<chrono::Utc>> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    metadata.modified().ok().map(chrono::DateTime::from)
}

/// Replace `path` with `text` so readers see either the old or the new document.
/// The replacement keeps the original file's permissions.
async fn write_atomically(path: &Path, text: &str) -> Result<()> {
    let permissions = tokio::fs::metadata(path)
        .await
        .map_err(|e| PmlError::io("stat document", path, e))?
        .permissions();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{}.{:08x}.tmp", file_name, fastrand::u32(..)));

    if let Err(e) = tokio::fs::write(&temp_path, text).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(PmlError::io("write document", &temp_path, e));
    }
    if let Err(e) = tokio::fs::set_permissions(&temp_path, permissions).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(PmlError::io("copy document permissions", &temp_path, e));
    }
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(PmlError::io("replace document", path, e));
    }
    Ok(())
}
