//! Lowering configuration.

use kes_diagnostic::DiagnosticConfig;

/// Options for one lowering pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LowerOptions {
    /// Error limit and deduplication for the diagnostic queue.
    pub diagnostics: DiagnosticConfig,
    /// Emit the `expr!` debug dumps. When off, `expr!` is just `expr`.
    pub debug_prints: bool,
    /// Function name left unmangled when declared with no parameters.
    pub entry_point: String,
}

impl Default for LowerOptions {
    fn default() -> Self {
        LowerOptions {
            diagnostics: DiagnosticConfig::default(),
            debug_prints: true,
            entry_point: "main".to_owned(),
        }
    }
}

impl LowerOptions {
    /// Defaults overridden by `KES_ERROR_LIMIT` (0 = unlimited) and
    /// `KES_DEBUG_PRINTS` (`0` disables the `expr!` dumps).
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(limit) = std::env::var("KES_ERROR_LIMIT")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            options.diagnostics.error_limit = limit;
        }
        if let Ok(v) = std::env::var("KES_DEBUG_PRINTS") {
            options.debug_prints = v.trim() != "0";
        }
        options
    }

    /// No error limit; used by tests that count every diagnostic.
    #[must_use]
    pub fn unlimited() -> Self {
        LowerOptions {
            diagnostics: DiagnosticConfig::unlimited(),
            ..Self::default()
        }
    }
}
