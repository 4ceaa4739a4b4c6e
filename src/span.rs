//! Source code location tracking
//!
//! Locations are used to tie tokens, AST nodes and diagnostics back to the
//! source text. Lines are 1-based; columns are the 0-based offset within the
//! line, which is also how far the diagnostic renderer indents its caret.

use std::fmt;

/// A location in the source code, plus the width of the caret span
/// a diagnostic about it should underline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct SourceLocation {
    /// Line number (1-based)
    pub line: u32,
    /// Column (0-based offset within the line)
    pub column: u32,
    /// Width of the underlined span, in characters
    pub length: usize,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32, length: usize) -> Self {
        Self { line, column, length }
    }

    /// A single-character location
    pub fn point(line: u32, column: u32) -> Self {
        Self { line, column, length: 1 }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Line information cache for converting byte offsets into line/column pairs.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of each line start
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Build the index for a source text
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Convert a byte offset to a (1-based line, 0-based column) pair
    pub fn position(&self, offset: usize) -> (u32, u32) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };
        let line_start = self.line_starts.get(line).copied().unwrap_or(0);
        (line as u32 + 1, (offset - line_start) as u32)
    }
}
