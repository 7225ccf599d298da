//! Objects: declarations, member access, indexing, construction, delete.
//!
//! An object declaration is entered in two steps so that its methods may
//! call each other in any order:
//!
//! 1. **declare**: struct body from the members, then every method,
//!    constructor and operator signature (`declare_object`)
//! 2. **define**: method bodies (`define_methods`)
//!
//! A member of type `T*` inside `T` resolves to the object being declared.

use kes_diagnostic::Diagnostic;
use kes_emit::{CastOp, TypeId, ValueId};
use kes_ir::{MemberDecl, Name, NodeId, NodeKind, NodeRange, ObjectDecl, OpSymbol, Span, TypeExpr};

use super::operators::UserOp;
use super::{Lowerer, Operand};
use crate::error::InternalError;
use crate::operators::OperatorKey;
use crate::runtime_decl::RuntimeFn;
use crate::type_lower::widens;

impl Lowerer<'_> {
    // -----------------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------------

    pub(crate) fn lower_object_decl(&mut self, id: NodeId, decl: &ObjectDecl, span: Span) {
        if self.func.is_some() {
            self.error(Diagnostic::structural(
                "objects must be declared at module scope",
                span,
            ));
            return;
        }
        self.declare_object(id, decl, span);
        let ast = self.ast;
        let methods = ast.list(decl.methods).to_vec();
        self.define_methods(&methods);
    }

    /// Step 1 for a source object. Runs once per declaration node.
    pub(crate) fn declare_object(&mut self, id: NodeId, decl: &ObjectDecl, span: Span) {
        if !self.declared.insert(id) {
            return;
        }
        let Some(ty) = self.probe_type(&TypeExpr::Named(decl.name), span) else {
            return;
        };
        if self.ctx.symbols.object(decl.name).is_some_and(|d| d.complete) {
            self.error(Diagnostic::structural(
                format!("object '{}' is already declared", self.name_str(decl.name)),
                span,
            ));
            return;
        }
        self.define_layout(ty, &decl.members, span);
        let ast = self.ast;
        let methods = ast.list(decl.methods).to_vec();
        self.declare_methods(ty, &methods);
    }

    /// Give `ty` its members and mark the object complete.
    pub(crate) fn define_layout(&mut self, ty: TypeId, members: &[MemberDecl], span: Span) {
        let mut fields = Vec::with_capacity(members.len());
        let mut table: Vec<(Name, TypeId)> = Vec::with_capacity(members.len());
        for member in members {
            let Some(field) = self.lower_type(&member.ty, span) else {
                continue;
            };
            if field == ty {
                self.error(Diagnostic::structural(
                    format!(
                        "member '{}' of '{}' contains its own object by value",
                        self.name_str(member.name),
                        self.describe(ty)
                    ),
                    span,
                ));
                continue;
            }
            if table.iter().any(|(n, _)| *n == member.name) {
                self.error(Diagnostic::structural(
                    format!("member '{}' is declared twice", self.name_str(member.name)),
                    span,
                ));
                continue;
            }
            fields.push(field);
            table.push((member.name, field));
        }
        self.emitter.set_struct_body(ty, &fields);
        let name = self.describe(ty);
        match self.ctx.symbols.object_by_type_mut(ty) {
            Some(desc) => {
                desc.members = table;
                desc.complete = true;
            }
            None => {
                self.set_fatal(InternalError::MissingObject { name });
                return;
            }
        }
        tracing::debug!(object = %self.describe(ty), members = fields.len(), "object declared");
    }

    pub(crate) fn declare_methods(&mut self, ty: TypeId, methods: &[NodeId]) {
        let ast = self.ast;
        for &method in methods {
            let node = ast.get(method);
            match &node.kind {
                NodeKind::Function(f) => self.declare_method(method, ty, f, node.span),
                NodeKind::Constructor(c) => self.declare_constructor(method, ty, c, node.span),
                NodeKind::Operator(o) => self.declare_operator(method, o, node.span),
                other => self.error(Diagnostic::structural(
                    format!("{} cannot appear in an object body", other.label()),
                    node.span,
                )),
            }
        }
    }

    pub(crate) fn define_methods(&mut self, methods: &[NodeId]) {
        for &method in methods {
            if self.is_fatal() {
                return;
            }
            self.define_pending(method);
        }
    }

    // -----------------------------------------------------------------------
    // Member access
    // -----------------------------------------------------------------------

    /// `object.member`: the member's slot in the object's struct. A pointer
    /// to an object is dereferenced first.
    pub(crate) fn lower_member(&mut self, object: NodeId, member: Name, span: Span) -> Option<Operand> {
        let op = self.lower_required(object)?;
        let (base, ty) = self.object_address(op, span)?;
        let slot = self.ctx.symbols.member(ty, member);
        let Ok(index) = u32::try_from(slot.index) else {
            self.error(Diagnostic::unresolved(
                format!(
                    "'{}' has no member '{}'",
                    self.describe(ty),
                    self.name_str(member)
                ),
                span,
            ));
            return None;
        };
        Some(Operand::place(self.emitter.struct_gep(base, index)))
    }

    /// `object[index]`: a registered `[]` operator, else pointer indexing.
    pub(crate) fn lower_index(&mut self, object: NodeId, index: NodeId, span: Span) -> Option<Operand> {
        let base = self.lower_required(object)?;
        let offset = self.lower_required(index)?;
        let base_ty = self.operand_ty(base);
        let offset_ty = self.operand_ty(offset);
        match self.find_operator(OperatorKey::binary(base_ty, OpSymbol::Index, offset_ty), span) {
            UserOp::Found(op) => return self.call_operator(op, &[base, offset], span),
            UserOp::Failed => return None,
            UserOp::Missing => {}
        }
        // `long` index operators also take narrower integers.
        let i64t = self.emitter.int_type(64);
        if offset_ty != i64t && widens(&*self.emitter, offset_ty, i64t) {
            match self.find_operator(OperatorKey::binary(base_ty, OpSymbol::Index, i64t), span) {
                UserOp::Found(op) => return self.call_operator(op, &[base, offset], span),
                UserOp::Failed => return None,
                UserOp::Missing => {}
            }
        }
        if self.pointee(base_ty).is_none() || !self.kind(offset_ty).is_int() {
            self.error(Diagnostic::type_mismatch(
                format!(
                    "cannot index '{}' with '{}'",
                    self.describe(base_ty),
                    self.describe(offset_ty)
                ),
                span,
            ));
            return None;
        }
        let pointer = self.load_operand(base);
        let offset = self.load_operand(offset);
        let offset = self.convert(offset, i64t)?;
        Some(Operand::place(self.emitter.gep(pointer, offset)))
    }

    // -----------------------------------------------------------------------
    // Construction and destruction
    // -----------------------------------------------------------------------

    /// `T(args)` or `new T(args)`.
    ///
    /// Storage is zeroed, then the matching constructor runs on it. An
    /// object without constructors accepts either no arguments or one per
    /// member, assigned in order. A stack object is a place; `new` yields
    /// the pointer.
    pub(crate) fn lower_construct(&mut self, ty: &TypeExpr, args: NodeRange, heap: bool, span: Span) -> Option<Operand> {
        let object = self.lower_type(ty, span)?;
        let ast = self.ast;
        let mut lowered = Vec::with_capacity(args.len());
        for &arg in ast.list(args) {
            lowered.push(self.lower_required(arg)?);
        }

        let storage = if heap {
            self.heap_alloc(object)
        } else {
            let slot = self.entry_alloca(object, "obj");
            let zero = self.emitter.const_zero(object);
            self.emitter.store(zero, slot);
            slot
        };

        if !self.is_struct(object) {
            // `int(x)` / `new int(x)`
            if let [arg] = lowered.as_slice() {
                let value = self.load_operand(*arg);
                let value = self.coerce(value, object, span)?;
                self.emitter.store(value, storage);
            } else if !lowered.is_empty() {
                self.error(Diagnostic::overload(
                    format!("'{}' takes at most one initializer", self.describe(object)),
                    span,
                ));
                return None;
            }
        } else {
            let has_constructors = self
                .ctx
                .symbols
                .constructors(object)
                .is_some_and(|set| !set.is_empty());
            if has_constructors {
                self.call_constructor(storage, object, &lowered, span)?;
            } else if !lowered.is_empty() {
                self.init_members(storage, object, &lowered, span)?;
            }
        }

        Some(if heap {
            Operand::value(storage)
        } else {
            Operand::place(storage)
        })
    }

    /// `calloc(1, sizeof(T))` as a `T*`.
    pub(crate) fn heap_alloc(&mut self, ty: TypeId) -> ValueId {
        let calloc = self.ctx.runtime.get(&mut *self.emitter, RuntimeFn::Calloc);
        let count = self.const_i64(1);
        let size = i64::try_from(self.emitter.size_of(ty).max(1)).unwrap_or(i64::MAX);
        let size = self.const_i64(size);
        let raw = self.emit_call(calloc, &[count, size]);
        let ptr_ty = self.emitter.pointer_type(ty);
        match raw {
            Some(raw) => self.emitter.cast(CastOp::BitCast, raw, ptr_ty),
            None => self.emitter.const_null(ptr_ty),
        }
    }

    fn init_members(&mut self, storage: ValueId, object: TypeId, args: &[Operand], span: Span) -> Option<()> {
        let member_count = self
            .ctx
            .symbols
            .object_by_type(object)
            .map_or(0, |d| d.members.len());
        if args.len() != member_count {
            self.error(Diagnostic::overload(
                format!(
                    "'{}' has {member_count} members but {} initializers were given",
                    self.describe(object),
                    args.len()
                ),
                span,
            ));
            return None;
        }
        for (i, &arg) in args.iter().enumerate() {
            let slot = self.ctx.symbols.member_at(object, i);
            let index = u32::try_from(slot.index).ok()?;
            let value = self.load_operand(arg);
            let value = self.coerce(value, slot.ty, span)?;
            let field = self.emitter.struct_gep(storage, index);
            self.emitter.store(value, field);
        }
        Some(())
    }

    /// `delete x`: the registered `delete` operator for the object, then
    /// `free` when `x` is a pointer.
    pub(crate) fn lower_delete(&mut self, operand: NodeId, span: Span) {
        let Some(op) = self.lower_required(operand) else {
            return;
        };
        let ty = self.operand_ty(op);
        let user = match self.find_operator(OperatorKey::postfix(ty, OpSymbol::Delete), span) {
            UserOp::Found(index) => Some(index),
            UserOp::Failed => return,
            UserOp::Missing => None,
        };
        let is_pointer = self.pointee(ty).is_some();
        if user.is_none() && !is_pointer {
            self.error(Diagnostic::type_mismatch(
                format!("cannot delete a value of type '{}'", self.describe(ty)),
                span,
            ));
            return;
        }
        if let Some(index) = user {
            self.call_operator(index, &[op], span);
        }
        if is_pointer {
            let pointer = self.load_operand(op);
            let i8p = self.i8_ptr();
            let raw = self.emitter.cast(CastOp::BitCast, pointer, i8p);
            let free = self.ctx.runtime.get(&mut *self.emitter, RuntimeFn::Free);
            self.emit_call(free, &[raw]);
        }
    }
}
