//! Kestrel IR: the AST the lowering core consumes.
//!
//! - [`Ast`]: flat node arena addressed by [`NodeId`]
//! - [`NodeKind`]: closed enum of expressions, statements and declarations
//! - [`TypeExpr`]: surface type expressions
//! - [`Name`] / [`StringInterner`]: interned identifiers
//! - [`AstBuilder`]: construction API for parsers and tests

pub mod ast;
mod builder;
mod interner;
mod name;
mod node_id;
mod ops;
mod span;
mod types;

pub use ast::{
    Ast, CatchClause, ConstructorDecl, FunctionDecl, MemberDecl, Node, NodeKind, ObjectDecl,
    OperatorDecl, Param, SwitchCase, TemplateDecl, VarInit,
};
pub use builder::AstBuilder;
pub use interner::StringInterner;
pub use name::Name;
pub use node_id::{NodeId, NodeRange};
pub use ops::{BinaryOp, LogicalOp, OpSymbol, UnaryOp};
pub use span::Span;
pub use types::{PrimType, TypeExpr};
