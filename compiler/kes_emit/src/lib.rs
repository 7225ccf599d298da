//! Backend boundary for the Kestrel compiler.
//!
//! - [`CodeEmitter`]: the trait lowering emits through
//! - [`ValueId`], [`TypeId`], [`BlockId`], [`FunctionId`]: opaque `Copy` handles
//! - [`TypeTable`] / [`TypeKind`]: interned backend types and their layout
//! - [`IrModule`]: in-memory recording backend with constant folding and a
//!   textual printer

mod emitter;
mod ids;
mod layout;
pub mod module;
pub mod ops;
mod types;

pub use emitter::CodeEmitter;
pub use ids::{BlockId, FunctionId, TypeId, ValueId};
pub use layout::POINTER_SIZE;
pub use module::{
    BlockData, Constant, FunctionData, Global, Instr, IrModule, Terminator, ValueData, ValueDef,
};
pub use ops::{BinOp, CastOp, FloatPredicate, IntPredicate};
pub use types::{FunctionSig, TypeKind, TypeTable};
