//! Block scanner
//!
//! A single forward pass over the document's lines with two states,
//! `Outside` and `InBlock`. Spans are byte offsets into the original text:
//! `start` is the first byte of the start-marker line, `end` is the last
//! byte of the end-marker line excluding its line terminator, so splicing
//! at a span keeps every line ending outside the block intact.

use thiserror::Error;

use super::directive::DirectiveKind;
use super::{annotation_target, END_MARKER};

/// Structural errors found while scanning a document
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("found new block at line {line} without ending the block opened at line {open_line}")]
    NestedBlock { line: usize, open_line: usize },

    #[error("found end marker without a block at line {line}")]
    StrayEnd { line: usize },

    #[error("document ended without closing the block opened at line {line}")]
    Unterminated { line: usize },
}

/// One delimited unit of directive work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Normalized start marker, e.g. `:ask`
    pub marker: String,
    /// Content lines without line terminators; trailing blank lines removed
    pub content: Vec<String>,
    /// Byte offset of the start-marker line
    pub start: usize,
    /// Byte offset just past the end marker
    pub end: usize,
    /// 1-based line number of the start marker
    pub line: usize,
}

impl Block {
    /// The directive kind, if the marker names a known one
    pub fn kind(&self) -> Option<DirectiveKind> {
        DirectiveKind::from_marker(&self.marker)
    }

    /// Content joined the way it is handed to an executor
    pub fn text(&self) -> String {
        self.content.join("\n")
    }
}

enum State {
    Outside,
    InBlock(Block),
}

/// Recognize a start-marker line; only the fixed directive markers open a block
fn start_marker(trimmed: &str) -> Option<String> {
    DirectiveKind::from_marker(trimmed).map(|kind| kind.marker().to_string())
}

/// Strip a trailing `\n` or `\r\n`
fn line_body(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Split a document into its ordered blocks
pub fn parse_blocks(text: &str) -> Result<Vec<Block>, ParseError> {
    let mut blocks = Vec::new();
    let mut state = State::Outside;
    let mut pos = 0usize;

    for (idx, raw) in text.split_inclusive('\n').enumerate() {
        let line_no = idx + 1;
        let body = line_body(raw);
        let trimmed = body.trim();

        // Annotations left by a previous run are neither markers nor content
        if annotation_target(trimmed).is_some() {
            pos += raw.len();
            continue;
        }

        state = match state {
            State::Outside => {
                if trimmed == END_MARKER {
                    return Err(ParseError::StrayEnd { line: line_no });
                }
                match start_marker(trimmed) {
                    Some(marker) => State::InBlock(Block {
                        marker,
                        content: Vec::new(),
                        start: pos,
                        end: pos,
                        line: line_no,
                    }),
                    None => State::Outside,
                }
            }
            State::InBlock(mut block) => {
                if trimmed == END_MARKER {
                    while block
                        .content
                        .last()
                        .is_some_and(|l| l.trim().is_empty())
                    {
                        block.content.pop();
                    }
                    block.end = pos + body.len();
                    blocks.push(block);
                    State::Outside
                } else if start_marker(trimmed).is_some() {
                    return Err(ParseError::NestedBlock {
                        line: line_no,
                        open_line: block.line,
                    });
                } else {
                    block.content.push(body.to_string());
                    State::InBlock(block)
                }
            }
        };

        pos += raw.len();
    }

    match state {
        State::Outside => Ok(blocks),
        State::InBlock(block) => Err(ParseError::Unterminated { line: block.line }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_block_span() {
        let text = "intro\n:ask\nWhat is 2+2?\n:--\noutro\n";
        let blocks = parse_blocks(text).unwrap();
        assert_eq!(blocks.len(), 1);

        let block = &blocks[0];
        assert_eq!(block.marker, ":ask");
        assert_eq!(block.kind(), Some(DirectiveKind::Ask));
        assert_eq!(block.content, vec!["What is 2+2?".to_string()]);
        assert_eq!(&text[block.start..block.end], ":ask\nWhat is 2+2?\n:--");
        assert_eq!(block.line, 2);
    }

    #[test]
    fn test_multiple_blocks_in_order() {
        let text = ":ask\nfirst\n:--\nbetween\n:do\nsecond\nmore\n:--";
        let blocks = parse_blocks(text).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text(), "first");
        assert_eq!(blocks[1].kind(), Some(DirectiveKind::Do));
        assert_eq!(blocks[1].text(), "second\nmore");
        assert!(blocks[0].end <= blocks[1].start);
        assert_eq!(blocks[1].end, text.len());
    }

    #[test]
    fn test_trailing_blank_lines_trimmed() {
        let blocks = parse_blocks(":ask\n\nquestion\n\n   \n:--\n").unwrap();
        assert_eq!(blocks[0].content, vec!["".to_string(), "question".to_string()]);
    }

    #[test]
    fn test_empty_block_is_valid() {
        let blocks = parse_blocks(":ask\n:--\n").unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].content.is_empty());
    }

    #[test]
    fn test_nesting_error() {
        let err = parse_blocks(":ask\nWhat is this:\n:ask\nNested\n:--\n:--\n").unwrap_err();
        assert_eq!(err, ParseError::NestedBlock { line: 3, open_line: 1 });
    }

    #[test]
    fn test_stray_end_error() {
        let err = parse_blocks("text\n:--\n").unwrap_err();
        assert_eq!(err, ParseError::StrayEnd { line: 2 });
    }

    #[test]
    fn test_unterminated_error() {
        let err = parse_blocks("x\n:ask\nno end").unwrap_err();
        assert_eq!(err, ParseError::Unterminated { line: 2 });
    }

    #[test]
    fn test_annotations_are_transparent() {
        let text = "head\n:--(r/ask_happy_panda.pml)\n:ask\nq\n:--(r/old.pml)\n:--\n";
        let blocks = parse_blocks(text).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].content, vec!["q".to_string()]);
    }

    #[test]
    fn test_processed_document_reparses_cleanly() {
        let text = "before\n:--(r/ask_calm_river.pml)\nafter\n";
        assert!(parse_blocks(text).unwrap().is_empty());
    }

    #[test]
    fn test_other_colon_lines_are_plain_text() {
        let text = "Remember to type\n:wq\nto quit vim.\n:ask\n:note inside\nWhat is 2+2?\n:--\n:todo\n:DO\nx\n:--\n";
        let blocks = parse_blocks(text).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].marker, ":ask");
        assert_eq!(
            blocks[0].content,
            vec![":note inside".to_string(), "What is 2+2?".to_string()]
        );
        assert_eq!(blocks[0].line, 4);
        assert_eq!(blocks[1].kind(), Some(DirectiveKind::Do));
        assert_eq!(blocks[1].marker, ":do");
    }

    #[test]
    fn test_crlf_span_excludes_terminator() {
        let text = ":ask\r\nq\r\n:--\r\nrest";
        let blocks = parse_blocks(text).unwrap();
        assert_eq!(blocks[0].content, vec!["q".to_string()]);
        assert_eq!(&text[blocks[0].end..], "\r\nrest");
    }
}
