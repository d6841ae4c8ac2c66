//! Document parsing: block scanning, directive kinds and checksums
//!
//! In-document syntax: a start marker line (`:ask`, `:do`), free-form content
//! lines, and an end marker line (`:--`). After processing, the whole block is
//! replaced by a reference annotation `:--(r/<artifact-name>)`.

pub mod blocks;
pub mod checksum;
pub mod directive;

pub use blocks::{parse_blocks, Block, ParseError};
pub use checksum::{block_checksum, document_checksum};
pub use directive::DirectiveKind;

/// End marker closing every block
pub const END_MARKER: &str = ":--";

const ANNOTATION_PREFIX: &str = ":--(r/";

/// The reference token spliced in place of a processed block
pub fn annotation(artifact_name: &str) -> String {
    format!("{}{})", ANNOTATION_PREFIX, artifact_name)
}

/// If `line` is a reference annotation, the artifact name it points to
pub fn annotation_target(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix(ANNOTATION_PREFIX)?
        .strip_suffix(')')
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_round_trip() {
        let token = annotation("ask_happy_panda.pml");
        assert_eq!(token, ":--(r/ask_happy_panda.pml)");
        assert_eq!(annotation_target(&token), Some("ask_happy_panda.pml"));
    }

    #[test]
    fn test_non_annotations() {
        assert_eq!(annotation_target(":--"), None);
        assert_eq!(annotation_target(":--(r/)"), None);
        assert_eq!(annotation_target("text :--(r/x)"), None);
    }
}
