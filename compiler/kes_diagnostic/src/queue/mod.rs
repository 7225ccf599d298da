//! Diagnostic queue for collecting, deduplicating, and sorting diagnostics.
//!
//! Features:
//! - Error limits to prevent overwhelming output
//! - Deduplication of identical same-line errors
//! - `ErrorGuaranteed` proof that errors were emitted

use crate::{Diagnostic, ErrorGuaranteed};

/// Configuration for diagnostic processing.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DiagnosticConfig {
    /// Maximum number of errors kept (0 = unlimited).
    pub error_limit: usize,
    /// Drop a diagnostic identical to the previous one on the same line.
    pub deduplicate: bool,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        DiagnosticConfig {
            error_limit: 20,
            deduplicate: true,
        }
    }
}

impl DiagnosticConfig {
    /// Create a config with no limits (for testing).
    pub fn unlimited() -> Self {
        DiagnosticConfig {
            error_limit: 0,
            deduplicate: false,
        }
    }
}

/// Queue of recorded diagnostics, in emission order.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct DiagnosticQueue {
    diagnostics: Vec<Diagnostic>,
    /// Errors rejected because the limit was reached.
    dropped: usize,
    config: DiagnosticConfig,
}

impl DiagnosticQueue {
    /// Create a new diagnostic queue with default configuration.
    pub fn new() -> Self {
        Self::with_config(DiagnosticConfig::default())
    }

    /// Create a diagnostic queue with custom configuration.
    pub fn with_config(config: DiagnosticConfig) -> Self {
        DiagnosticQueue {
            diagnostics: Vec::new(),
            dropped: 0,
            config,
        }
    }

    /// Record a diagnostic.
    ///
    /// Returns `true` if the diagnostic was kept, `false` if it was filtered.
    pub fn push(&mut self, diag: Diagnostic) -> bool {
        if self.limit_reached() {
            self.dropped += 1;
            return false;
        }
        if self.config.deduplicate && self.diagnostics.last() == Some(&diag) {
            return false;
        }
        self.diagnostics.push(diag);
        true
    }

    /// Record an error and get proof it was emitted.
    pub fn emit_error(&mut self, diag: Diagnostic) -> ErrorGuaranteed {
        self.push(diag);
        ErrorGuaranteed::new()
    }

    /// Check if the error limit has been reached.
    pub fn limit_reached(&self) -> bool {
        self.config.error_limit > 0 && self.diagnostics.len() >= self.config.error_limit
    }

    /// Number of errors recorded (kept or dropped by the limit).
    pub fn error_count(&self) -> usize {
        self.diagnostics.len() + self.dropped
    }

    /// `Some` if at least one error was recorded.
    pub fn has_errors(&self) -> Option<ErrorGuaranteed> {
        ErrorGuaranteed::from_error_count(self.error_count())
    }

    /// Sort diagnostics by line and return them, clearing the queue.
    ///
    /// Sorting is stable, so diagnostics on one line keep emission order.
    pub fn flush(&mut self) -> Vec<Diagnostic> {
        let mut out = std::mem::take(&mut self.diagnostics);
        out.sort_by_key(Diagnostic::line);
        self.dropped = 0;
        out
    }

    /// Get diagnostics without clearing the queue.
    pub fn peek(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn config(&self) -> &DiagnosticConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests;
