//! Proof that at least one error was emitted.

use std::fmt;

/// Zero-sized proof that an error diagnostic was recorded.
///
/// Only [`DiagnosticQueue`](crate::DiagnosticQueue) hands these out.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ErrorGuaranteed(());

impl ErrorGuaranteed {
    pub(crate) fn new() -> Self {
        ErrorGuaranteed(())
    }

    /// `Some` when `count` is non-zero.
    pub fn from_error_count(count: usize) -> Option<Self> {
        (count > 0).then(Self::new)
    }
}

impl fmt::Display for ErrorGuaranteed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error(s) emitted")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_error_count() {
        assert!(ErrorGuaranteed::from_error_count(2).is_some());
        assert!(ErrorGuaranteed::from_error_count(0).is_none());
    }

    #[test]
    fn display_shows_error_message() {
        assert_eq!(ErrorGuaranteed::new().to_string(), "error(s) emitted");
    }
}
