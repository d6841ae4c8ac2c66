//! Result artifact layout
//!
//! ```text
//! # metadata:{"is_ephemeral":true,"type":":ask","summary":"..."}
//!
//! Question:
//! <block content>
//!
//! Answer:
//! <result>
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::core::errors::{PmlError, Result};
use crate::parser::DirectiveKind;

const HEADER_PREFIX: &str = "# metadata:";
const QUESTION_SEPARATOR: &str = "\n\nQuestion:\n";
const ANSWER_SEPARATOR: &str = "\n\nAnswer:\n";

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactHeader {
    is_ephemeral: bool,
    #[serde(rename = "type")]
    directive: String,
    summary: String,
}

/// One block's question and answer, persisted under a results area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultArtifact {
    pub name: String,
    pub kind: DirectiveKind,
    pub summary: String,
    pub question: String,
    pub answer: String,
    pub ephemeral: bool,
}

impl ResultArtifact {
    pub fn render(&self) -> Result<String> {
        let header = ArtifactHeader {
            is_ephemeral: self.ephemeral,
            directive: self.kind.marker().to_string(),
            summary: self.summary.clone(),
        };
        Ok(format!(
            "{}{}{}{}{}{}\n",
            HEADER_PREFIX,
            serde_json::to_string(&header)?,
            QUESTION_SEPARATOR,
            self.question,
            ANSWER_SEPARATOR,
            self.answer
        ))
    }

    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self> {
        let name = name.into();
        let invalid = |reason: &str| PmlError::InvalidArtifact {
            name: name.clone(),
            reason: reason.to_string(),
        };

        let (header_line, body) = text
            .split_once(QUESTION_SEPARATOR)
            .ok_or_else(|| invalid("missing question section"))?;
        let header_json = header_line
            .strip_prefix(HEADER_PREFIX)
            .ok_or_else(|| invalid("missing metadata header"))?;
        let header: ArtifactHeader = serde_json::from_str(header_json)?;
        let kind = DirectiveKind::from_marker(&header.directive)
            .ok_or_else(|| invalid("unknown directive type"))?;

        let (question, answer) = body
            .split_once(ANSWER_SEPARATOR)
            .ok_or_else(|| invalid("missing answer section"))?;

        Ok(Self {
            name: name.clone(),
            kind,
            summary: header.summary,
            question: question.to_string(),
            answer: answer.strip_suffix('\n').unwrap_or(answer).to_string(),
            ephemeral: header.is_ephemeral,
        })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PmlError::io("read artifact", path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::parse(name, &text)
    }
}

/// Whether the artifact at `path` carries the ephemeral flag
pub fn is_ephemeral(path: &Path) -> Result<bool> {
    if path.is_dir() {
        return Ok(false);
    }
    let text = std::fs::read_to_string(path).map_err(|e| PmlError::io("read artifact", path, e))?;
    let Some(header_json) = text.lines().find_map(|line| line.strip_prefix(HEADER_PREFIX)) else {
        return Ok(false);
    };
    let header: ArtifactHeader = serde_json::from_str(header_json)?;
    Ok(header.is_ephemeral)
}

/// Every ephemeral artifact in any results area under `root`
pub fn list_ephemeral_artifacts(root: &Path, results_subdir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .parent()
                .is_some_and(|dir| dir.ends_with(results_subdir))
        })
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == super::ARTIFACT_EXTENSION))
        .filter(|entry| is_ephemeral(entry.path()).unwrap_or(false))
        .map(|entry| entry.into_path())
        .collect();
    found.sort();
    found
}
