//! Semantic analysis and lowering for Kestrel.
//!
//! Walks a parsed [`kes_ir::Ast`] once, in source order, resolving names,
//! overloads, operators and template instances against a
//! [`CompilationContext`], and emits the program through a
//! [`kes_emit::CodeEmitter`].
//!
//! # Architecture
//!
//! - **Context** (`context.rs`): every table the pass mutates, passed by `&mut`
//! - **Symbols** (`symbols/`): variables, function overload sets, objects
//! - **Operators** (`operators.rs`): user and synthesized operator registry
//! - **Templates** (`templates.rs`): blueprints and the instance cache
//! - **Throwables** (`throwables.rs`): runtime type descriptors for exceptions
//! - **Lowerer** (`lowerer/`): per-node lowering, split by concern
//!
//! # Errors
//!
//! User errors are [`kes_diagnostic::Diagnostic`]s collected in the context;
//! the offending node produces no value and lowering carries on. Broken
//! invariants between lowering steps are [`InternalError`]s and end the pass.
//!
//! # Debugging
//!
//! - `RUST_LOG=kes_lower=debug`: declarations, instances, descriptors
//! - `RUST_LOG=kes_lower=trace`: every lowered node
//! - `KES_ERROR_LIMIT`, `KES_DEBUG_PRINTS`: see [`LowerOptions::from_env`]

#![allow(
    // Backend indices are u32, sizes u64, constants i64
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    // Lowering methods thread operands, spans and blocks
    clippy::too_many_arguments,
    // Lowering returns Option to propagate already-reported failures
    clippy::unnecessary_wraps,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
)]

mod context;
mod error;
mod lowerer;
mod operators;
mod options;
mod runtime_decl;
mod stack;
pub mod symbols;
mod templates;
mod throwables;
mod type_lower;

use std::sync::Once;

use kes_diagnostic::Diagnostic;
use kes_emit::{CodeEmitter, TypeId};
use kes_ir::{Ast, NodeId, StringInterner};
use rustc_hash::FxHashMap;
use tracing::instrument;

pub use context::CompilationContext;
pub use error::InternalError;
pub use lowerer::Lowerer;
pub use operators::{OperatorEntry, OperatorKey, OperatorRegistry};
pub use options::LowerOptions;
pub use runtime_decl::{RuntimeDecls, RuntimeFn};
pub use stack::ensure_sufficient_stack;
pub use symbols::{ThrowSet, VarBinding};
pub use templates::{Blueprint, BlueprintBody, TemplateRegistry};
pub use throwables::ThrowableRegistry;
pub use type_lower::describe_type;

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Does nothing when `RUST_LOG` is unset. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

/// Result of lowering one module.
#[derive(Debug)]
pub struct LowerOutcome {
    /// Errors reported by this pass, in order.
    pub diagnostics: Vec<Diagnostic>,
    /// Errors recorded, including any beyond the queue's limit.
    pub error_count: usize,
    /// Exception types each node may propagate.
    pub node_throws: FxHashMap<NodeId, ThrowSet>,
}

impl LowerOutcome {
    pub fn is_success(&self) -> bool {
        self.error_count == 0
    }

    pub fn throwable_types(&self, id: NodeId) -> &[TypeId] {
        self.node_throws.get(&id).map_or(&[], |t| t.as_slice())
    }

    /// One `line N: error: message` per diagnostic.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for diag in &self.diagnostics {
            out.push_str(&diag.to_string());
            out.push('\n');
        }
        out
    }
}

/// Lower the module rooted at `root` into `emitter`.
///
/// Lowering a second module into the same context sees everything the
/// first declared.
#[instrument(skip_all, fields(nodes = ast.len()))]
pub fn lower_module(
    ctx: &mut CompilationContext,
    ast: &Ast,
    root: NodeId,
    interner: &StringInterner,
    emitter: &mut dyn CodeEmitter,
) -> Result<LowerOutcome, InternalError> {
    let before = ctx.error_count();
    let node_throws = {
        let mut lowerer = Lowerer::new(ctx, ast, interner, emitter);
        lowerer.lower_root(root);
        lowerer.finish()?
    };
    let error_count = ctx.error_count() - before;
    let diagnostics = ctx.diagnostics.flush();
    tracing::debug!(errors = error_count, "module lowered");
    Ok(LowerOutcome {
        diagnostics,
        error_count,
        node_throws,
    })
}
