//! Persists one artifact per processed block and splices reference
//! annotations into the document at each block's original span.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::artifact::ResultArtifact;
use super::names::NameRegistry;
use crate::core::errors::{PmlError, Result};
use crate::parser::{annotation, Block, DirectiveKind};

/// Exclusive-create attempts before a block's result is inlined instead
const MAX_CREATE_ATTEMPTS: usize = 16;

/// Result handed to the materializer for one block
#[derive(Debug, Clone)]
pub struct BlockResult {
    pub result: String,
    /// Artifact already holding this result from an earlier run
    pub artifact: Option<String>,
}

/// Where a block's result ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Artifact(String),
    Inline,
}

impl Placement {
    pub fn artifact(&self) -> Option<&str> {
        match self {
            Placement::Artifact(name) => Some(name),
            Placement::Inline => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Materialized {
    pub text: String,
    pub placements: Vec<Placement>,
    /// Artifact files written by this call, as opposed to reused ones
    pub created: Vec<PathBuf>,
}

/// Copy everything outside the block spans verbatim and substitute each span
pub fn splice(text: &str, blocks: &[Block], replacements: &[String]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (block, replacement) in blocks.iter().zip(replacements) {
        out.push_str(&text[last..block.start]);
        out.push_str(replacement);
        last = block.end;
    }
    out.push_str(&text[last..]);
    out
}

#[derive(Debug, Default)]
pub struct Materializer {
    names: NameRegistry,
}

impl Materializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> &NameRegistry {
        &self.names
    }

    /// Persist artifacts for `blocks` and return the rewritten document
    pub async fn materialize(
        &self,
        document: &Path,
        text: &str,
        blocks: &[Block],
        results: &[BlockResult],
        results_dir: &Path,
    ) -> Result<Materialized> {
        if blocks.len() != results.len() {
            return Err(PmlError::Internal(format!(
                "{} blocks but {} results",
                blocks.len(),
                results.len()
            )));
        }

        tokio::fs::create_dir_all(results_dir)
            .await
            .map_err(|e| PmlError::io("create results directory", results_dir, e))?;

        let document_name = document
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut placements = Vec::with_capacity(blocks.len());
        let mut replacements = Vec::with_capacity(blocks.len());
        let mut created = Vec::new();

        for (index, (block, result)) in blocks.iter().zip(results).enumerate() {
            let reusable = match &result.artifact {
                Some(name) => tokio::fs::metadata(results_dir.join(name))
                    .await
                    .is_ok_and(|metadata| metadata.is_file())
                    .then_some(name),
                None => None,
            };

            let placement = match reusable {
                Some(name) => {
                    debug!(block = index, artifact = %name, "Reusing artifact");
                    Placement::Artifact(name.clone())
                }
                None => match self
                    .persist(results_dir, &document_name, index, block, &result.result)
                    .await
                {
                    Ok(name) => {
                        created.push(results_dir.join(&name));
                        Placement::Artifact(name)
                    }
                    Err(e) => {
                        warn!(
                            document = %document.display(),
                            block = index,
                            error = %e,
                            "Artifact write failed, inlining result"
                        );
                        Placement::Inline
                    }
                },
            };

            replacements.push(match &placement {
                Placement::Artifact(name) => annotation(name),
                Placement::Inline => result.result.clone(),
            });
            placements.push(placement);
        }

        Ok(Materialized {
            text: splice(text, blocks, &replacements),
            placements,
            created,
        })
    }

    /// Remove the artifacts a materialization created, for a run that will not be committed
    pub async fn discard(&self, materialized: &Materialized) {
        for path in &materialized.created {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!(artifact = %path.display(), "Discarded uncommitted artifact"),
                Err(e) => warn!(artifact = %path.display(), error = %e, "Failed to discard artifact"),
            }
        }
    }

    /// Claim a name and create the artifact file; retries when another process wins the race
    async fn persist(
        &self,
        results_dir: &Path,
        document_name: &str,
        index: usize,
        block: &Block,
        result: &str,
    ) -> Result<String> {
        let kind = block.kind();
        let prefix = kind.map(|k| k.prefix()).unwrap_or("result");

        for _ in 0..MAX_CREATE_ATTEMPTS {
            let name = self.names.claim(results_dir, document_name, index, prefix).await;
            let artifact = ResultArtifact {
                name: name.clone(),
                kind: kind.unwrap_or(DirectiveKind::Ask),
                summary: format!("Result for block {} from {}", index, document_name),
                question: block.text(),
                answer: result.to_string(),
                ephemeral: true,
            };
            let rendered = artifact.render()?;
            let path = results_dir.join(&name);

            let opened = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            let mut file = match opened {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(artifact = %name, "Artifact name taken on disk, retrying");
                    tokio::time::sleep(Duration::from_micros(fastrand::u64(50..500))).await;
                    continue;
                }
                Err(e) => return Err(PmlError::io("create artifact", &path, e)),
            };

            file.write_all(rendered.as_bytes())
                .await
                .map_err(|e| PmlError::io("write artifact", &path, e))?;
            file.flush()
                .await
                .map_err(|e| PmlError::io("flush artifact", &path, e))?;
            return Ok(name);
        }

        Err(PmlError::Internal(format!(
            "could not create an artifact in {} after {} attempts",
            results_dir.display(),
            MAX_CREATE_ATTEMPTS
        )))
    }
}
