//! Normalized content fingerprints used as cache keys

use sha2::{Digest, Sha256};

use super::annotation_target;
use super::blocks::Block;

fn hex_digest(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// Fingerprint of a whole document.
///
/// Reference annotations are dropped and every line is trimmed, blank lines
/// removed, before hashing.
pub fn document_checksum(text: &str) -> String {
    let normalized: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && annotation_target(line).is_none())
        .collect();
    hex_digest(&normalized.join("\n"))
}

/// Fingerprint of a single block: its marker plus its trimmed, non-blank lines.
/// Position in the document plays no part.
pub fn block_checksum(block: &Block) -> String {
    let mut normalized = String::new();
    normalized.push_str(&block.marker.trim().to_ascii_lowercase());
    normalized.push('\n');
    for line in &block.content {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            normalized.push_str(trimmed);
            normalized.push('\n');
        }
    }
    hex_digest(&normalized)
}
