//! Node lowering coordinator.
//!
//! `Lowerer` owns the per-pass state (current function, loop targets,
//! enclosing tries, throw-set bookkeeping) and dispatches each `NodeKind`
//! to a focused `lower_*` method implemented in a separate file.
//!
//! # Architecture
//!
//! ```text
//! Lowerer
//!   ├── literals.rs      — literals, identifiers, `this`, variable declarations
//!   ├── operators.rs     — binary, unary, assignment, casts, implicit conversions
//!   ├── control_flow.rs  — conditions, logical chains, if/while/for/switch, jumps
//!   ├── calls.rs         — calls, method calls, argument adaptation, invoke
//!   ├── objects.rs       — object declarations, members, index, construct, delete
//!   ├── declarations.rs  — functions, operators, module scope, globals
//!   ├── exceptions.rs    — throw, try/catch, landing pads, dispatch chains
//!   ├── builtins.rs      — print, `expr!`, asm, sizeof
//!   ├── types.rs         — surface type lowering
//!   ├── instantiate.rs   — template declarations and instantiation
//!   └── dynarray.rs      — the built-in `Array<T>` operators
//! ```
//!
//! # Operands
//!
//! Every node lowers to an [`Operand`]: a backend value plus a `place`
//! flag saying the value is the *address* of the expression's storage.
//! Identifiers, member accesses, dereferences and index expressions are
//! places; `lower(id, true)` loads them, `lower(id, false)` hands out the
//! address. This is the deferred dereference the symbol table relies on:
//! it stores addresses, never values.

mod builtins;
mod calls;
mod control_flow;
mod declarations;
mod dynarray;
mod exceptions;
mod instantiate;
mod literals;
mod objects;
mod operators;
mod types;

use std::rc::Rc;

use kes_diagnostic::Diagnostic;
use kes_emit::{BlockId, CodeEmitter, FunctionId, TypeId, TypeKind, ValueId};
use kes_ir::{Ast, Name, NodeId, NodeKind, Span, StringInterner};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::context::CompilationContext;
use crate::error::InternalError;
use crate::stack::ensure_sufficient_stack;
use crate::symbols::{merge_throws, ThrowSet};
use crate::type_lower::{describe_type, pointee, EmitterTypes};

use declarations::PendingFn;

// ---------------------------------------------------------------------------
// Operand
// ---------------------------------------------------------------------------

/// A lowered node: a value, or the address of a storage location.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Operand {
    pub value: ValueId,
    pub place: bool,
}

impl Operand {
    pub fn value(value: ValueId) -> Self {
        Operand {
            value,
            place: false,
        }
    }

    pub fn place(address: ValueId) -> Self {
        Operand {
            value: address,
            place: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-function state
// ---------------------------------------------------------------------------

/// Break and continue targets of one enclosing loop or switch.
///
/// A switch has no continue target; `continue` inside it goes to the
/// nearest enclosing loop.
#[derive(Copy, Clone, Debug)]
pub(crate) struct LoopTargets {
    pub break_bb: BlockId,
    pub continue_bb: Option<BlockId>,
}

/// An enclosing `try` in the current function.
#[derive(Clone, Debug)]
pub(crate) struct TryFrame {
    /// Unwind target of every call in the body.
    pub landing_bb: BlockId,
    /// `{ i8*, i32 }` landing pad value, stored on entry to `landing_bb`.
    pub pad_slot: ValueId,
    /// Head of the catch dispatch chain.
    pub dispatch_bb: BlockId,
    /// Types of the explicit catch clauses, in declaration order.
    pub catch_types: Vec<TypeId>,
}

impl TryFrame {
    /// A try without catch clauses handles what its body throws.
    pub fn catches_everything(&self) -> bool {
        self.catch_types.is_empty()
    }
}

/// The function whose body is being lowered.
#[derive(Clone, Debug)]
pub(crate) struct FunctionState {
    pub id: FunctionId,
    /// Mangled symbol, for messages.
    pub symbol: String,
    pub ret: TypeId,
    pub ret_ref: bool,
    /// Object type when lowering a method or constructor.
    pub this_ty: Option<TypeId>,
    /// Holds every `alloca`; branches to the body once the body is done.
    pub alloca_bb: BlockId,
}

// ---------------------------------------------------------------------------
// Lowerer
// ---------------------------------------------------------------------------

/// Lowers one AST into a [`CodeEmitter`] against a shared
/// [`CompilationContext`].
pub struct Lowerer<'a> {
    pub(crate) ctx: &'a mut CompilationContext,
    pub(crate) ast: &'a Ast,
    pub(crate) interner: &'a StringInterner,
    pub(crate) emitter: &'a mut dyn CodeEmitter,
    /// `ast` shared with template blueprints, created on first need.
    shared_ast: Option<Rc<Ast>>,
    pub(crate) func: Option<FunctionState>,
    pub(crate) loops: Vec<LoopTargets>,
    pub(crate) tries: Vec<TryFrame>,
    /// Throw sets of the nodes currently being lowered, innermost last.
    throw_stack: Vec<ThrowSet>,
    node_throws: FxHashMap<NodeId, ThrowSet>,
    /// Declared callables whose bodies are not lowered yet, by decl node.
    pub(crate) pending: FxHashMap<NodeId, PendingFn>,
    /// Declaration nodes already entered into the tables.
    pub(crate) declared: FxHashSet<NodeId>,
    fatal: Option<InternalError>,
    pub(crate) this_name: Name,
    /// Span of the node most recently dispatched.
    cur_span: Span,
}

impl<'a> Lowerer<'a> {
    pub fn new(
        ctx: &'a mut CompilationContext,
        ast: &'a Ast,
        interner: &'a StringInterner,
        emitter: &'a mut dyn CodeEmitter,
    ) -> Self {
        Lowerer {
            ctx,
            ast,
            interner,
            emitter,
            shared_ast: None,
            func: None,
            loops: Vec::new(),
            tries: Vec::new(),
            throw_stack: Vec::new(),
            node_throws: FxHashMap::default(),
            pending: FxHashMap::default(),
            declared: FxHashSet::default(),
            fatal: None,
            this_name: interner.intern("this"),
            cur_span: Span::DUMMY,
        }
    }

    /// Lowerer over a blueprint's AST, which is already shared.
    pub(crate) fn for_blueprint(
        ctx: &'a mut CompilationContext,
        ast: &'a Rc<Ast>,
        interner: &'a StringInterner,
        emitter: &'a mut dyn CodeEmitter,
    ) -> Self {
        let mut lowerer = Self::new(ctx, ast, interner, emitter);
        lowerer.shared_ast = Some(Rc::clone(ast));
        lowerer
    }

    /// Lower the module rooted at `root`.
    pub fn lower_root(&mut self, root: NodeId) {
        match self.ast.try_get(root).map(|n| &n.kind) {
            Some(NodeKind::Module(_)) => {
                self.lower_operand(root);
            }
            _ => self.set_fatal(InternalError::RootNotModule),
        }
    }

    /// Lower `id`. With `auto_deref`, a place is loaded and its value
    /// returned; without, its address is returned.
    pub fn lower(&mut self, id: NodeId, auto_deref: bool) -> Option<ValueId> {
        let op = self.lower_operand(id)?;
        if auto_deref {
            Some(self.load_operand(op))
        } else {
            Some(op.value)
        }
    }

    /// Exception types `id` may propagate, known once it is lowered.
    pub fn throwable_types(&self, id: NodeId) -> &[TypeId] {
        self.node_throws.get(&id).map_or(&[], |t| t.as_slice())
    }

    /// Number of enclosing loops and switches.
    pub fn loop_depth(&self) -> usize {
        self.loops.len()
    }

    /// End the pass, handing back every node's throw set.
    pub fn finish(self) -> Result<FxHashMap<NodeId, ThrowSet>, InternalError> {
        match self.fatal {
            Some(e) => Err(e),
            None => Ok(self.node_throws),
        }
    }

    // -----------------------------------------------------------------------
    // Main dispatch
    // -----------------------------------------------------------------------

    /// Lower a node to an operand, recording its throw set.
    ///
    /// Returns `None` for statements, void calls, and nodes that failed
    /// (the failure is already reported).
    pub(crate) fn lower_operand(&mut self, id: NodeId) -> Option<Operand> {
        if self.fatal.is_some() || !id.is_valid() {
            return None;
        }
        self.throw_stack.push(ThrowSet::new());
        let result = ensure_sufficient_stack(|| self.dispatch(id));
        let throws = self.throw_stack.pop().unwrap_or_default();
        if !throws.is_empty() {
            if let Some(parent) = self.throw_stack.last_mut() {
                merge_throws(parent, &throws);
            }
            self.node_throws.insert(id, throws);
        }
        result
    }

    /// Every `NodeKind` is listed explicitly so a new kind fails to compile
    /// here until it is handled.
    #[allow(
        clippy::too_many_lines,
        reason = "exhaustive match over all NodeKind variants; splitting would obscure dispatch"
    )]
    fn dispatch(&mut self, id: NodeId) -> Option<Operand> {
        let ast = self.ast;
        let node = ast.get(id);
        let span = node.span;
        self.cur_span = span;
        tracing::trace!(kind = node.kind.label(), line = span.line, "lower");

        if self.func.is_none() && !allowed_at_module_scope(&node.kind) {
            self.error(Diagnostic::structural(
                format!("{} is not allowed at module scope", node.kind.label()),
                span,
            ));
            return None;
        }

        match &node.kind {
            // --- Literals & names (literals.rs) ---
            NodeKind::IntLit(v) => Some(self.lower_int(*v)),
            NodeKind::FloatLit(v) => Some(self.lower_float(*v)),
            NodeKind::BoolLit(v) => Some(self.lower_bool(*v)),
            NodeKind::CharLit(v) => Some(self.lower_char(*v)),
            NodeKind::StrLit(s) => Some(self.lower_string(*s)),
            NodeKind::Null => Some(self.lower_null()),
            NodeKind::Ident(name) => self.lower_ident(*name, span),
            NodeKind::This => self.lower_this(span),
            NodeKind::VarDecl { ty, vars } => {
                self.lower_var_decl(ty, vars, span);
                None
            }

            // --- Operators (operators.rs) ---
            NodeKind::Binary { op, lhs, rhs } => self.lower_binary(*op, *lhs, *rhs, span),
            NodeKind::Unary { op, operand } => self.lower_unary(*op, *operand, span),
            NodeKind::Assign { op, target, value } => self.lower_assign(*op, *target, *value, span),
            NodeKind::Cast { expr, ty } => self.lower_cast(*expr, ty, span),

            // --- Control flow (control_flow.rs) ---
            NodeKind::Logical { .. } | NodeKind::Comparison { .. } => self.lower_bool_chain(id),
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.lower_if(*cond, *then_branch, *else_branch);
                None
            }
            NodeKind::While { cond, body } => {
                self.lower_while(*cond, *body);
                None
            }
            NodeKind::For {
                init,
                cond,
                step,
                body,
            } => {
                self.lower_for(*init, *cond, *step, *body);
                None
            }
            NodeKind::Switch {
                scrutinee,
                cases,
                default,
                auto_break,
            } => {
                self.lower_switch(*scrutinee, cases, *default, *auto_break, span);
                None
            }
            NodeKind::Break => {
                self.lower_break(span);
                None
            }
            NodeKind::Continue => {
                self.lower_continue(span);
                None
            }
            NodeKind::Return(value) => {
                self.lower_return(*value, span);
                None
            }
            NodeKind::Block(stmts) => {
                self.lower_block(*stmts);
                None
            }

            // --- Calls (calls.rs) ---
            NodeKind::Call { callee, args } => self.lower_call(*callee, *args, span),
            NodeKind::MethodCall {
                receiver,
                method,
                args,
            } => self.lower_method_call(*receiver, *method, *args, span),

            // --- Objects (objects.rs) ---
            NodeKind::Member { object, member } => self.lower_member(*object, *member, span),
            NodeKind::Index { object, index } => self.lower_index(*object, *index, span),
            NodeKind::Construct { ty, args, heap } => self.lower_construct(ty, *args, *heap, span),
            NodeKind::Delete(operand) => {
                self.lower_delete(*operand, span);
                None
            }

            // --- Built-ins (builtins.rs) ---
            NodeKind::SizeOf(ty) => self.lower_size_of(ty, span),
            NodeKind::DebugPrint(expr) => self.lower_debug_print(*expr, span),
            NodeKind::Print(args) => {
                self.lower_print(*args, span);
                None
            }
            NodeKind::Asm(text) => {
                self.lower_asm(*text);
                None
            }

            // --- Exceptions (exceptions.rs) ---
            NodeKind::Throw(value) => {
                self.lower_throw(*value, span);
                None
            }
            NodeKind::Try { body, catches } => {
                self.lower_try(*body, catches, span);
                None
            }

            // --- Declarations (declarations.rs, objects.rs, instantiate.rs) ---
            NodeKind::Function(decl) => {
                self.lower_function_decl(id, decl, span);
                None
            }
            NodeKind::Operator(decl) => {
                self.lower_operator_decl(id, decl, span);
                None
            }
            NodeKind::Object(decl) => {
                self.lower_object_decl(id, decl, span);
                None
            }
            NodeKind::Template(decl) => {
                self.register_template(decl, span);
                None
            }
            NodeKind::Constructor(_) => {
                self.error(Diagnostic::structural(
                    "constructor declared outside an object",
                    span,
                ));
                None
            }
            NodeKind::Module(items) => {
                self.lower_module_items(*items);
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Values and places
    // -----------------------------------------------------------------------

    /// Lower `id` and load it if it is a place. Reports nodes that produce
    /// nothing unless they already reported why.
    pub(crate) fn lower_value(&mut self, id: NodeId) -> Option<ValueId> {
        let before = self.ctx.error_count();
        match self.lower_operand(id) {
            Some(op) => Some(self.load_operand(op)),
            None => {
                if self.ctx.error_count() == before && self.fatal.is_none() {
                    let span = self.span(id);
                    self.error(Diagnostic::type_mismatch("expression has no value", span));
                }
                None
            }
        }
    }

    /// Like [`Lowerer::lower_value`], but keeps places as places.
    pub(crate) fn lower_required(&mut self, id: NodeId) -> Option<Operand> {
        let before = self.ctx.error_count();
        let op = self.lower_operand(id);
        if op.is_none() && self.ctx.error_count() == before && self.fatal.is_none() {
            let span = self.span(id);
            self.error(Diagnostic::type_mismatch("expression has no value", span));
        }
        op
    }

    /// Lower a statement, discarding any value.
    pub(crate) fn lower_stmt(&mut self, id: NodeId) {
        self.lower_operand(id);
    }

    /// Type of the value an operand stands for.
    pub(crate) fn operand_ty(&self, op: Operand) -> TypeId {
        let ty = self.emitter.type_of(op.value);
        if op.place {
            self.pointee(ty).unwrap_or(ty)
        } else {
            ty
        }
    }

    pub(crate) fn load_operand(&mut self, op: Operand) -> ValueId {
        if !op.place {
            return op.value;
        }
        if self.func.is_none() {
            // Module scope has no insertion point; only globals'
            // addresses are usable there.
            self.error(Diagnostic::structural(
                "global initializers must be constants",
                self.cur_span,
            ));
            let ty = self.operand_ty(op);
            return self.emitter.const_zero(ty);
        }
        self.emitter.load(op.value)
    }

    /// Address of an operand, spilling values to a temporary.
    pub(crate) fn address_of(&mut self, op: Operand) -> ValueId {
        if op.place {
            op.value
        } else {
            self.spill(op.value)
        }
    }

    /// Store `value` in a fresh stack slot and return the slot.
    pub(crate) fn spill(&mut self, value: ValueId) -> ValueId {
        let ty = self.emitter.type_of(value);
        let slot = self.entry_alloca(ty, "tmp");
        self.emitter.store(value, slot);
        slot
    }

    /// `alloca` in the function's entry block, so loops do not grow the stack.
    pub(crate) fn entry_alloca(&mut self, ty: TypeId, name: &str) -> ValueId {
        let here = self.emitter.current_block();
        if let Some(f) = &self.func {
            self.emitter.position_at_end(f.alloca_bb);
        }
        let slot = self.emitter.alloca(ty, name);
        if let Some(bb) = here {
            self.emitter.position_at_end(bb);
        }
        slot
    }

    // -----------------------------------------------------------------------
    // Blocks
    // -----------------------------------------------------------------------

    /// New block in the current function.
    pub(crate) fn append_block(&mut self, name: &str) -> BlockId {
        let f = self
            .func
            .as_ref()
            .map(|f| f.id)
            .or_else(|| self.emitter.current_function())
            .unwrap_or(FunctionId::NONE);
        self.emitter.append_block(f, name)
    }

    /// Branch to `dest` unless the current block already ended.
    pub(crate) fn br_if_open(&mut self, dest: BlockId) {
        if !self.emitter.current_block_terminated() {
            self.emitter.br(dest);
        }
    }

    /// Continue in a fresh block nothing branches to. Used after jumps so
    /// statements following them have somewhere to go.
    pub(crate) fn start_dead_block(&mut self) {
        let bb = self.append_block("dead");
        self.emitter.position_at_end(bb);
    }

    // -----------------------------------------------------------------------
    // Throw-set bookkeeping
    // -----------------------------------------------------------------------

    /// Record that the node being lowered may propagate `types`.
    pub(crate) fn note_throws(&mut self, types: &[TypeId]) {
        if let Some(top) = self.throw_stack.last_mut() {
            merge_throws(top, types);
        }
    }

    pub(crate) fn push_throw_frame(&mut self) {
        self.throw_stack.push(ThrowSet::new());
    }

    pub(crate) fn pop_throw_frame(&mut self) -> ThrowSet {
        self.throw_stack.pop().unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    pub(crate) fn span(&self, id: NodeId) -> Span {
        self.ast.try_get(id).map_or(Span::DUMMY, |n| n.span)
    }

    pub(crate) fn name_str(&self, name: Name) -> &'static str {
        self.interner.lookup(name)
    }

    pub(crate) fn error(&mut self, diag: Diagnostic) {
        self.ctx.error(diag);
    }

    /// Record an unrecoverable error; lowering stops at the next node.
    pub(crate) fn set_fatal(&mut self, error: InternalError) {
        tracing::error!(%error, "internal lowering error");
        if self.fatal.is_none() {
            self.fatal = Some(error);
        }
    }

    pub(crate) fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }

    pub(crate) fn describe(&self, ty: TypeId) -> String {
        describe_type(&*self.emitter, ty)
    }

    pub(crate) fn kind(&self, ty: TypeId) -> TypeKind {
        self.emitter.type_kind(ty)
    }

    pub(crate) fn pointee(&self, ty: TypeId) -> Option<TypeId> {
        pointee(&*self.emitter, ty)
    }

    pub(crate) fn is_struct(&self, ty: TypeId) -> bool {
        self.kind(ty) == TypeKind::Struct
    }

    pub(crate) fn types(&self) -> EmitterTypes<'_> {
        EmitterTypes(&*self.emitter)
    }

    pub(crate) fn i8_ptr(&mut self) -> TypeId {
        let i8t = self.emitter.int_type(8);
        self.emitter.pointer_type(i8t)
    }

    pub(crate) fn const_i64(&mut self, value: i64) -> ValueId {
        let i64t = self.emitter.int_type(64);
        self.emitter.const_int(i64t, value)
    }

    pub(crate) fn const_i32(&mut self, value: i64) -> ValueId {
        let i32t = self.emitter.int_type(32);
        self.emitter.const_int(i32t, value)
    }

    /// The AST as an `Rc`, for blueprints that outlive this pass.
    pub(crate) fn shared_ast(&mut self) -> Rc<Ast> {
        let ast = self.ast;
        Rc::clone(self.shared_ast.get_or_insert_with(|| Rc::new(ast.clone())))
    }
}

/// Node kinds that need no insertion point: declarations, the statements
/// that define and initialize globals, and constant expressions.
fn allowed_at_module_scope(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Module(_)
            | NodeKind::Function(_)
            | NodeKind::Object(_)
            | NodeKind::Template(_)
            | NodeKind::Operator(_)
            | NodeKind::VarDecl { .. }
            | NodeKind::Assign { op: None, .. }
            | NodeKind::IntLit(_)
            | NodeKind::FloatLit(_)
            | NodeKind::BoolLit(_)
            | NodeKind::CharLit(_)
            | NodeKind::StrLit(_)
            | NodeKind::Null
            | NodeKind::Ident(_)
            | NodeKind::Binary { .. }
            | NodeKind::Unary { .. }
            | NodeKind::Cast { .. }
            | NodeKind::SizeOf(_)
    )
}

#[cfg(test)]
mod tests;
