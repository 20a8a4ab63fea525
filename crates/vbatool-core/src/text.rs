//! Text position utilities for byte offset and line:column conversions.
//!
//! Lines and columns are 1-indexed (editor convention), byte offsets are
//! 0-indexed. Module sources are treated as UTF-8; columns count bytes.

use crate::patch::Span;
use crate::types::Selection;

/// Precomputed line-start table for fast offset→position lookups.
///
/// Built once per module source; used by the parser to attach selections to
/// every span-carrying node without rescanning the text.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the first character of each line.
    line_starts: Vec<usize>,
    /// Total length of the indexed text in bytes.
    len: usize,
}

impl LineIndex {
    /// Build a line index for the given text.
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i + 1);
            }
        }
        LineIndex {
            line_starts,
            len: text.len(),
        }
    }

    /// Convert a byte offset to a 1-indexed (line, column) pair.
    ///
    /// Offsets past the end of the text clamp to the final position.
    pub fn position(&self, offset: usize) -> (u32, u32) {
        let offset = offset.min(self.len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let col = offset - self.line_starts[line];
        (line as u32 + 1, col as u32 + 1)
    }

    /// Convert a byte span to a selection covering the same text.
    ///
    /// The selection's end column is the column of the last byte in the span
    /// (inclusive), matching editor selection conventions.
    pub fn selection(&self, span: Span) -> Selection {
        let (start_line, start_column) = self.position(span.start as usize);
        let end_offset = (span.end as usize).saturating_sub(1).max(span.start as usize);
        let (end_line, end_column) = self.position(end_offset);
        Selection::new(start_line, start_column, end_line, end_column)
    }
}

/// Convert a byte offset to 1-indexed line and column.
///
/// One-shot variant for callers that do not hold a [`LineIndex`].
pub fn byte_offset_to_position(content: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(content.len());
    let mut line = 1u32;
    let mut col = 1u32;
    for (i, byte) in content.bytes().enumerate() {
        if i >= offset {
            break;
        }
        if byte == b'\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// Convert 1-indexed line and column to a byte offset.
///
/// Positions beyond the content clamp to the content length; positions beyond
/// a line's end clamp to the end of that line.
pub fn position_to_byte_offset(content: &str, line: u32, col: u32) -> usize {
    let line = line.max(1);
    let col = col.max(1);
    let mut current_line = 1u32;
    let bytes = content.as_bytes();

    for i in 0..=bytes.len() {
        if current_line == line {
            let offset_in_line = (col as usize) - 1;
            let line_end = bytes[i..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|p| i + p)
                .unwrap_or(bytes.len());
            return (i + offset_in_line).min(line_end);
        }
        if i < bytes.len() && bytes[i] == b'\n' {
            current_line += 1;
        }
    }

    content.len()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_to_position_simple() {
        let content = "line1\nline2\nline3\n";
        assert_eq!(byte_offset_to_position(content, 0), (1, 1));
        assert_eq!(byte_offset_to_position(content, 4), (1, 5));
        assert_eq!(byte_offset_to_position(content, 6), (2, 1));
        assert_eq!(byte_offset_to_position(content, 12), (3, 1));
    }

    #[test]
    fn position_to_offset_simple() {
        let content = "line1\nline2\nline3\n";
        assert_eq!(position_to_byte_offset(content, 1, 1), 0);
        assert_eq!(position_to_byte_offset(content, 1, 5), 4);
        assert_eq!(position_to_byte_offset(content, 2, 1), 6);
        assert_eq!(position_to_byte_offset(content, 3, 1), 12);
    }

    #[test]
    fn position_clamps_past_line_end() {
        let content = "ab\ncd\n";
        assert_eq!(position_to_byte_offset(content, 1, 99), 2);
        assert_eq!(position_to_byte_offset(content, 99, 1), content.len());
    }

    #[test]
    fn line_index_matches_scan() {
        let content = "Public Sub Foo()\n    Const c = 9\nEnd Sub\n";
        let index = LineIndex::new(content);
        for offset in [0, 5, 16, 17, 21, 33, content.len()] {
            assert_eq!(index.position(offset), byte_offset_to_position(content, offset));
        }
    }

    #[test]
    fn line_index_selection_covers_span() {
        let content = "Dim foo As Long\n";
        let index = LineIndex::new(content);
        // "foo" occupies bytes 4..7
        let sel = index.selection(Span::new(4, 7));
        assert_eq!(sel, Selection::new(1, 5, 1, 7));
    }

    #[test]
    fn line_index_empty_span() {
        let content = "abc\n";
        let index = LineIndex::new(content);
        let sel = index.selection(Span::new(2, 2));
        assert_eq!(sel.start_line, 1);
        assert_eq!(sel.start_column, 3);
    }
}
