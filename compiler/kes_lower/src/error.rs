//! Unrecoverable lowering failures.
//!
//! Everything a user can cause is a [`Diagnostic`](kes_diagnostic::Diagnostic)
//! and lowering carries on. These variants are broken invariants between
//! lowering steps; they end the pass.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InternalError {
    #[error("overload '{name}' vanished after it was resolved")]
    VanishedOverload { name: String },

    #[error("object '{name}' has no descriptor for its backend type")]
    MissingObject { name: String },

    #[error("template '{name}' lost its blueprint during instantiation")]
    MissingBlueprint { name: String },

    #[error("break/continue target stack unbalanced in '{function}': expected depth {expected}, found {found}")]
    UnbalancedTargets {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("root node is not a module")]
    RootNotModule,
}
