//! Source location spans.

use std::fmt;

/// Source location span.
///
/// Byte offsets into the source file plus the 1-based line of `start`.
/// The line is carried directly because diagnostics and the `expr!` debug
/// dump report lines, and the lowering core never sees source text.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
    pub line: u32,
}

impl Span {
    /// Dummy span for generated code.
    pub const DUMMY: Span = Span {
        start: 0,
        end: 0,
        line: 0,
    };

    /// Create a new span.
    #[inline]
    pub const fn new(start: u32, end: u32, line: u32) -> Self {
        Span { start, end, line }
    }

    /// Span covering only a line (no byte offsets known).
    #[inline]
    pub const fn at_line(line: u32) -> Self {
        Span {
            start: 0,
            end: 0,
            line,
        }
    }

    /// Length of the span in bytes.
    #[inline]
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Check if span is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Merge two spans into one covering both.
    #[must_use]
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: match (self.line, other.line) {
                (0, l) | (l, 0) => l,
                (a, b) => a.min(b),
            },
        }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}@{}", self.start, self.end, self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_covers_both() {
        let a = Span::new(4, 8, 2);
        let b = Span::new(10, 12, 3);
        let m = a.merge(b);
        assert_eq!((m.start, m.end, m.line), (4, 12, 2));
    }

    #[test]
    fn dummy_is_empty() {
        assert!(Span::DUMMY.is_empty());
        assert_eq!(Span::at_line(7).line, 7);
    }
}
