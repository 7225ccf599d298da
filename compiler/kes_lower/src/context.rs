//! Compilation context: every table a lowering pass reads and mutates.
//!
//! One context serves one translation unit. Lowering a second module into
//! the same context models an import: its declarations see everything the
//! first module declared.

use kes_diagnostic::{Diagnostic, DiagnosticQueue};
use kes_ir::StringInterner;

use crate::operators::OperatorRegistry;
use crate::options::LowerOptions;
use crate::runtime_decl::RuntimeDecls;
use crate::symbols::SymbolTable;
use crate::templates::TemplateRegistry;
use crate::throwables::ThrowableRegistry;

pub struct CompilationContext {
    pub options: LowerOptions,
    pub diagnostics: DiagnosticQueue,
    pub symbols: SymbolTable,
    pub operators: OperatorRegistry,
    pub templates: TemplateRegistry,
    pub throwables: ThrowableRegistry,
    pub runtime: RuntimeDecls,
}

impl CompilationContext {
    pub fn new(options: LowerOptions, interner: &StringInterner) -> Self {
        let diagnostics = DiagnosticQueue::with_config(options.diagnostics.clone());
        CompilationContext {
            options,
            diagnostics,
            symbols: SymbolTable::new(),
            operators: OperatorRegistry::new(),
            templates: TemplateRegistry::new(interner),
            throwables: ThrowableRegistry::new(),
            runtime: RuntimeDecls::new(),
        }
    }

    /// Record a recoverable error.
    pub fn error(&mut self, diag: Diagnostic) {
        tracing::debug!(line = diag.line(), message = %diag.message, "diagnostic");
        self.diagnostics.push(diag);
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.error_count()
    }
}
