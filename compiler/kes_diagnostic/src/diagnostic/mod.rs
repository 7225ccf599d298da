//! Core diagnostic type.

use std::fmt;

use kes_ir::Span;

/// Which class of lowering failure a diagnostic reports.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum DiagnosticKind {
    /// Unknown variable, function, object, member or template.
    UnresolvedName,
    /// No function, constructor or operator matches the argument types,
    /// or more than one does.
    OverloadMismatch,
    /// Operand kinds are incompatible and no user overload applies.
    TypeMismatch,
    /// Redeclaration, invalid placement, or missing catch coverage.
    Structural,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::UnresolvedName => "unresolved name",
            DiagnosticKind::OverloadMismatch => "overload mismatch",
            DiagnosticKind::TypeMismatch => "type mismatch",
            DiagnosticKind::Structural => "structural error",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-line error message anchored at a source span.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, span: Span) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
            span,
        }
    }

    pub fn unresolved(message: impl Into<String>, span: Span) -> Self {
        Self::new(DiagnosticKind::UnresolvedName, message, span)
    }

    pub fn overload(message: impl Into<String>, span: Span) -> Self {
        Self::new(DiagnosticKind::OverloadMismatch, message, span)
    }

    pub fn type_mismatch(message: impl Into<String>, span: Span) -> Self {
        Self::new(DiagnosticKind::TypeMismatch, message, span)
    }

    pub fn structural(message: impl Into<String>, span: Span) -> Self {
        Self::new(DiagnosticKind::Structural, message, span)
    }

    /// Source line, 0 when unknown.
    pub fn line(&self) -> u32 {
        self.span.line
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.span.line == 0 {
            write!(f, "error: {}", self.message)
        } else {
            write!(f, "line {}: error: {}", self.span.line, self.message)
        }
    }
}

#[cfg(test)]
mod tests;
