//! Source Location Utilities
//!
//! Line/column tracking for byte inputs. Lines are separated by `\n`; columns
//! count bytes, so a multi-byte UTF-8 character advances the column by its
//! encoded length.

use std::fmt;

/// A position in the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourcePosition {
    /// Byte offset from start of input
    pub offset: usize,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based, in bytes)
    pub column: usize,
}

impl SourcePosition {
    /// Create a new source position
    #[inline]
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }

    /// Position at the start of input
    #[inline]
    pub fn start() -> Self {
        Self::new(0, 1, 1)
    }

    /// Calculate position from an offset in the input. Offsets past the end
    /// are clamped to the input length.
    pub fn from_offset(input: &[u8], offset: usize) -> Self {
        let offset = offset.min(input.len());
        let before = &input[..offset];
        let line = 1 + memchr::memchr_iter(b'\n', before).count();
        let line_start = memchr::memrchr(b'\n', before).map_or(0, |i| i + 1);

        Self {
            offset,
            line,
            column: offset - line_start + 1,
        }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// The full line containing `offset`, without its terminating newline
pub fn line_at_offset(input: &[u8], offset: usize) -> &[u8] {
    let offset = offset.min(input.len());
    let start = memchr::memrchr(b'\n', &input[..offset]).map_or(0, |i| i + 1);
    let end = memchr::memchr(b'\n', &input[offset..]).map_or(input.len(), |i| offset + i);
    &input[start..end]
}

/// Render the line containing `offset` with a caret under the offending
/// column:
///
/// ```text
///  2 | let x = ;
///    |         ^
/// ```
pub fn format_context(input: &[u8], offset: usize) -> String {
    let pos = SourcePosition::from_offset(input, offset);
    let line = String::from_utf8_lossy(line_at_offset(input, offset));
    let gutter = pos.line.to_string();
    format!(
        "{} | {}\n{} | {}^",
        gutter,
        line,
        " ".repeat(gutter.len()),
        " ".repeat(pos.column - 1)
    )
}
