//! Byte offsets to LSP positions and back.
//!
//! LSP columns count UTF-16 code units.

use taplo_cst::{TextRange, TextSize};
use tower_lsp::lsp_types::{Position, Range};

/// Convert byte offset to LSP Position
pub fn offset_to_position(content: &str, offset: usize) -> Position {
    let mut line = 0u32;
    let mut col = 0u32;

    for (i, ch) in content.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += ch.len_utf16() as u32;
        }
    }

    Position::new(line, col)
}

/// Convert LSP Position to byte offset. Positions past the end of a line
/// clamp to the line end.
pub fn position_to_offset(content: &str, position: Position) -> usize {
    let mut line = 0u32;
    let mut col = 0u32;

    for (i, ch) in content.char_indices() {
        if line == position.line && col >= position.character {
            return i;
        }
        if ch == '\n' {
            if line == position.line {
                return i;
            }
            line += 1;
            col = 0;
        } else {
            col += ch.len_utf16() as u32;
        }
    }

    content.len()
}

pub fn to_lsp_range(content: &str, range: TextRange) -> Range {
    Range {
        start: offset_to_position(content, range.start().into()),
        end: offset_to_position(content, range.end().into()),
    }
}

/// The range covering the whole document.
pub fn full_range(content: &str) -> Range {
    Range {
        start: Position::new(0, 0),
        end: offset_to_position(content, content.len()),
    }
}

pub fn text_size(offset: usize) -> TextSize {
    TextSize::try_from(offset).unwrap_or(TextSize::from(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn test_offset_to_position() {
        let content = "a = 1\nbb = 2\n";
        assert_eq!(offset_to_position(content, 0), Position::new(0, 0));
        assert_eq!(offset_to_position(content, 6), Position::new(1, 0));
        assert_eq!(offset_to_position(content, 9), Position::new(1, 3));
        assert_eq!(offset_to_position(content, content.len()), Position::new(2, 0));
    }

    #[test]
    fn test_utf16_columns() {
        let content = "k = \"😀\" # x\n";
        let hash = content.find('#').unwrap();
        // The emoji is four bytes but two UTF-16 units.
        assert_eq!(offset_to_position(content, hash), Position::new(0, 9));
        assert_eq!(position_to_offset(content, Position::new(0, 9)), hash);
    }

    #[test]
    fn test_position_to_offset_clamps() {
        let content = "a = 1\nb = 2";
        assert_eq!(position_to_offset(content, Position::new(0, 99)), 5);
        assert_eq!(position_to_offset(content, Position::new(1, 4)), 10);
        assert_eq!(position_to_offset(content, Position::new(7, 0)), content.len());
    }

    #[test]
    fn test_full_range() {
        let range = full_range("a = 1\nb = 2");
        assert_eq!(range.end, Position::new(1, 5));
    }
}
