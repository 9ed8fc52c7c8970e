//! Source location tracking

use serde::{Deserialize, Serialize};

/// A byte range in the source text the AST was produced from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Spans synthesized without a source position are empty and cannot
    /// be mapped back to a line.
    pub fn is_resolvable(&self) -> bool {
        self.end > self.start
    }

    /// The excerpt of `code` covered by this span, clamped to the text.
    pub fn excerpt<'a>(&self, code: &'a str) -> &'a str {
        let end = self.end.min(code.len());
        let start = self.start.min(end);
        code.get(start..end).unwrap_or("")
    }

    /// 1-based line and 0-based column of `start`, found by scanning `code`.
    pub fn line_column(&self, code: &str) -> (usize, usize) {
        let mut line = 1;
        let mut column = 0;
        for (_, ch) in code.char_indices().take_while(|(idx, _)| *idx < self.start) {
            if ch == '\n' {
                line += 1;
                column = 0;
            } else {
                column += 1;
            }
        }
        (line, column)
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl From<Span> for std::ops::Range<usize> {
    fn from(span: Span) -> Self {
        span.start..span.end
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}
