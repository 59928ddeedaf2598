//! Source locations attached to tokens, AST nodes and diagnostics.

use std::fmt;

/// A byte range in the source plus the line/column where it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Merge two spans, keeping the start position of whichever comes first.
    pub fn merge(&self, other: &Span) -> Span {
        let (first, _) = if self.start <= other.start {
            (self, other)
        } else {
            (other, self)
        };
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: first.line,
            column: first.column,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_earliest_location() {
        let a = Span::new(4, 6, 1, 5);
        let b = Span::new(10, 14, 2, 3);

        let merged = b.merge(&a);
        assert_eq!(merged, Span::new(4, 14, 1, 5));
    }

    #[test]
    fn test_display_is_line_colon_column() {
        assert_eq!(Span::new(0, 1, 3, 7).to_string(), "3:7");
        assert_eq!(Span::default().to_string(), "0:0");
    }
}
