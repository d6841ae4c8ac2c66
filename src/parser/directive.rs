use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of directive kinds a block may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveKind {
    /// `:ask` - a question put to the executor
    Ask,
    /// `:do` - an action handed to the executor
    Do,
}

impl DirectiveKind {
    pub const ALL: [DirectiveKind; 2] = [DirectiveKind::Ask, DirectiveKind::Do];

    /// The start marker as written in documents
    pub fn marker(&self) -> &'static str {
        match self {
            DirectiveKind::Ask => ":ask",
            DirectiveKind::Do => ":do",
        }
    }

    /// Prefix used in artifact names
    pub fn prefix(&self) -> &'static str {
        match self {
            DirectiveKind::Ask => "ask",
            DirectiveKind::Do => "do",
        }
    }

    /// Resolve a normalized start marker; unknown markers yield `None`
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker.trim().to_ascii_lowercase().as_str() {
            ":ask" => Some(DirectiveKind::Ask),
            ":do" => Some(DirectiveKind::Do),
            _ => None,
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_round_trip() {
        for kind in DirectiveKind::ALL {
            assert_eq!(DirectiveKind::from_marker(kind.marker()), Some(kind));
        }
        assert_eq!(DirectiveKind::from_marker("  :ASK "), Some(DirectiveKind::Ask));
        assert_eq!(DirectiveKind::from_marker(":foo"), None);
    }
}
