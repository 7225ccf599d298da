//! Diagnostics for the Kestrel lowering core.
//!
//! Every recoverable error is a single-line [`Diagnostic`] tagged with a
//! [`DiagnosticKind`] and the source line it came from. Diagnostics are
//! collected in a [`DiagnosticQueue`] so one pass can surface several
//! independent errors.
//!
//! # Error Guarantees
//!
//! [`ErrorGuaranteed`] can only be obtained from the queue after an error
//! was recorded, which lets callers prove a failure was reported.

mod diagnostic;
mod guarantee;
pub mod queue;

pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use guarantee::ErrorGuaranteed;
pub use queue::{DiagnosticConfig, DiagnosticQueue};
