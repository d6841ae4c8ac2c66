//! Human-readable, collision-free artifact names
//!
//! A candidate is `<prefix>_<adjective>_<noun>.pml`, picked by a seed made
//! from the document name, the block index and a per-key counter. A
//! candidate is accepted only if no one in this process claimed it and no
//! file of that name exists in the results area. Once a key's counter has
//! walked the whole adjective x noun space, names fall back to
//! `<prefix>_<unix-nanos>_<n>.pml`.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

pub const ARTIFACT_EXTENSION: &str = "pml";

const ADJECTIVES: [&str; 32] = [
    "happy", "clever", "swift", "gentle", "brave", "wise", "calm", "bright",
    "kind", "quick", "silent", "proud", "bold", "eager", "peaceful", "witty",
    "warm", "smart", "noble", "merry", "amber", "lucky", "misty", "quiet",
    "rapid", "sunny", "tidy", "vivid", "young", "zesty", "fuzzy", "jolly",
];

const NOUNS: [&str; 32] = [
    "panda", "falcon", "dolphin", "phoenix", "tiger", "maple", "river", "mountain",
    "breeze", "cloud", "crystal", "garden", "meadow", "ocean", "forest", "sunrise",
    "comet", "rainbow", "valley", "whisper", "harbor", "lantern", "otter", "pebble",
    "quartz", "reef", "sparrow", "thicket", "willow", "yarrow", "ember", "glacier",
];

/// Number of distinct mnemonic names per prefix
pub const NAME_SPACE: usize = ADJECTIVES.len() * NOUNS.len();

#[derive(Debug, Default)]
struct NameState {
    /// Full paths handed out by this process; never released
    claimed: HashSet<PathBuf>,
    /// Next counter per (document, block, prefix)
    counters: HashMap<String, usize>,
    fallback_seq: u64,
}

/// Name-claim registry owned by one engine
#[derive(Debug, Default)]
pub struct NameRegistry {
    state: Mutex<NameState>,
}

fn document_seed(document_name: &str) -> usize {
    document_name
        .bytes()
        .fold(0usize, |hash, b| hash.wrapping_mul(31).wrapping_add(b as usize))
}

/// The mnemonic name for a seed; consecutive seeds cover the whole space
fn mnemonic(prefix: &str, seed: usize) -> String {
    let slot = seed % NAME_SPACE;
    let adjective = ADJECTIVES[slot % ADJECTIVES.len()];
    let noun = NOUNS[slot / ADJECTIVES.len()];
    format!("{}_{}_{}.{}", prefix, adjective, noun, ARTIFACT_EXTENSION)
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a fresh name in `results_dir` for block `block_index` of `document_name`
    ///
    /// Candidates are reserved under the lock; the on-disk existence check
    /// runs after it is released. A candidate found on disk stays reserved.
    pub async fn claim(
        &self,
        results_dir: &Path,
        document_name: &str,
        block_index: usize,
        prefix: &str,
    ) -> String {
        let key = format!("{}:{}:{}", document_name, block_index, prefix);
        let base = document_seed(document_name).wrapping_add(block_index);

        loop {
            let (candidate, fallback) = self.reserve(results_dir, &key, base, prefix);
            match tokio::fs::try_exists(results_dir.join(&candidate)).await {
                Ok(false) => return candidate,
                Ok(true) => continue,
                // Exclusive create catches a fallback name that turns out to be taken
                Err(_) if fallback => return candidate,
                Err(e) => {
                    debug!(artifact = %candidate, error = %e, "Cannot check candidate, skipping");
                }
            }
        }
    }

    /// Reserve the next candidate not yet handed out by this registry
    fn reserve(&self, results_dir: &Path, key: &str, base: usize, prefix: &str) -> (String, bool) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut counter = state.counters.get(key).copied().unwrap_or(0);
        while counter < NAME_SPACE {
            let candidate = mnemonic(prefix, base.wrapping_add(counter));
            counter += 1;
            if state.claimed.insert(results_dir.join(&candidate)) {
                state.counters.insert(key.to_string(), counter);
                return (candidate, false);
            }
        }
        state.counters.insert(key.to_string(), counter);

        debug!(key, "Name space exhausted, using fallback");
        let stamp = Utc::now().timestamp_nanos_opt().unwrap_or(0);
        loop {
            state.fallback_seq += 1;
            let candidate = format!(
                "{}_{}_{}.{}",
                prefix, stamp, state.fallback_seq, ARTIFACT_EXTENSION
            );
            if state.claimed.insert(results_dir.join(&candidate)) {
                return (candidate, true);
            }
        }
    }

    /// Number of names handed out so far
    pub fn claimed_count(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.claimed.len()
    }
}
