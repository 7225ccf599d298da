//! `throw` and `try`/`catch` on top of the Itanium-style unwinding runtime.
//!
//! Every call inside a try body is an `invoke` unwinding to the try's
//! landing pad. The pad stores `{ payload, selector }` and enters the
//! dispatch chain, which compares the selector against each catch type's
//! `eh_typeid_for` in declaration order:
//!
//! ```text
//! lpad ─► catch.dispatch ─► catch.next ─► ... ─► outer dispatch / resume
//!               │                │
//!             catch            catch
//!               └──────┬─────────┘
//!                   try.end
//! ```
//!
//! A try without catch clauses handles exactly the types its body can
//! throw, discards them, and aborts on anything else.

use kes_diagnostic::Diagnostic;
use kes_emit::{BlockId, CastOp, FunctionId, IntPredicate, TypeId, ValueId};
use kes_ir::{CatchClause, Name, NodeId, OpSymbol, Span};

use super::operators::UserOp;
use super::{Lowerer, TryFrame};
use crate::error::InternalError;
use crate::operators::OperatorKey;
use crate::runtime_decl::RuntimeFn;
use crate::symbols::{ThrowSet, VarBinding};

impl Lowerer<'_> {
    // -----------------------------------------------------------------------
    // throw
    // -----------------------------------------------------------------------

    pub(crate) fn lower_throw(&mut self, value: NodeId, span: Span) {
        let Some(op) = self.lower_required(value) else {
            return;
        };
        let ty = self.operand_ty(op);
        let Some(dtor) = self.throw_destructor(ty, span) else {
            return;
        };
        let value = self.load_operand(op);

        let alloc = self.ctx.runtime.get(&mut *self.emitter, RuntimeFn::AllocateException);
        let size = i64::try_from(self.emitter.size_of(ty).max(1)).unwrap_or(i64::MAX);
        let size = self.const_i64(size);
        let Some(raw) = self.emit_call(alloc, &[size]) else {
            return;
        };
        let ptr_ty = self.emitter.pointer_type(ty);
        let slot = self.emitter.cast(CastOp::BitCast, raw, ptr_ty);
        self.emitter.store(value, slot);

        let descriptor = self.type_descriptor(ty);
        let throw = self.ctx.runtime.get(&mut *self.emitter, RuntimeFn::Throw);
        self.emit_call(throw, &[raw, descriptor, dtor]);
        self.note_throws(&[ty]);
        self.emitter.unreachable();
        self.start_dead_block();
    }

    /// The `char*` destructor handed to `__cxa_throw`: null for values
    /// without an object type, else a thunk running the type's `delete`
    /// operator. An object without one cannot be thrown.
    fn throw_destructor(&mut self, ty: TypeId, span: Span) -> Option<ValueId> {
        let i8p = self.i8_ptr();
        if !self.is_struct(ty) {
            return Some(self.emitter.const_null(i8p));
        }
        let thunk = match self.ctx.throwables.destructor(ty) {
            Some(f) => f,
            None => {
                let f = self.destructor_thunk(ty, span)?;
                self.ctx.throwables.set_destructor(ty, f);
                f
            }
        };
        let ptr = self.emitter.function_ptr(thunk);
        Some(self.emitter.cast(CastOp::BitCast, ptr, i8p))
    }

    /// `void __kes_dtor.T(char* payload)` calling `operator delete(T)`.
    fn destructor_thunk(&mut self, ty: TypeId, span: Span) -> Option<FunctionId> {
        let index = match self.find_operator(OperatorKey::postfix(ty, OpSymbol::Delete), span) {
            UserOp::Found(index) => index,
            UserOp::Failed => return None,
            UserOp::Missing => {
                self.error(Diagnostic::structural(
                    format!(
                        "'{}' cannot be thrown: it has no delete operator",
                        self.describe(ty)
                    ),
                    span,
                ));
                return None;
            }
        };
        let Some(entry) = self.ctx.operators.get(index).cloned() else {
            self.set_fatal(InternalError::VanishedOverload {
                name: format!("operator delete({})", self.describe(ty)),
            });
            return None;
        };
        let by_address = entry
            .params
            .first()
            .is_some_and(|p| p.is_reference || self.pointee(p.ty) == Some(ty));

        let i8p = self.i8_ptr();
        let void = self.emitter.void_type();
        let fn_ty = self.emitter.function_type(&[i8p], void, false);
        let name = format!("__kes_dtor.{}", self.describe(ty));
        let thunk = self.emitter.declare_function(&name, fn_ty);

        let here = self.emitter.current_block();
        let bb = self.emitter.append_block(thunk, "entry");
        self.emitter.position_at_end(bb);
        let raw = self.emitter.param(thunk, 0);
        let ptr_ty = self.emitter.pointer_type(ty);
        let typed = self.emitter.cast(CastOp::BitCast, raw, ptr_ty);
        let arg = if by_address {
            typed
        } else {
            self.emitter.load(typed)
        };
        self.emitter.call(entry.function, &[arg]);
        self.emitter.ret(None);
        match here {
            Some(bb) => self.emitter.position_at_end(bb),
            None => self.emitter.clear_position(),
        }
        tracing::debug!(%name, "destructor thunk created");
        Some(thunk)
    }

    /// Descriptor of `ty` as a `char*`.
    fn type_descriptor(&mut self, ty: TypeId) -> ValueId {
        let label = self.describe(ty);
        let global = self.ctx.throwables.descriptor(&mut *self.emitter, ty, &label);
        let i8p = self.i8_ptr();
        self.emitter.cast(CastOp::BitCast, global, i8p)
    }

    // -----------------------------------------------------------------------
    // try / catch
    // -----------------------------------------------------------------------

    pub(crate) fn lower_try(&mut self, body: NodeId, catches: &[CatchClause], span: Span) {
        let Some(function) = self.func.as_ref().map(|f| f.id) else {
            return;
        };
        let personality = self.ctx.runtime.get(&mut *self.emitter, RuntimeFn::Personality);
        self.emitter.set_personality(function, personality);

        // A clause that fails is dropped; the body is still lowered.
        let mut clauses: Vec<(&CatchClause, TypeId)> = Vec::with_capacity(catches.len());
        for clause in catches {
            let Some(ty) = self.lower_type(clause.ty.strip_reference(), span) else {
                continue;
            };
            if clauses.iter().any(|&(_, t)| t == ty) {
                self.error(Diagnostic::structural(
                    format!("'{}' is caught twice", self.describe(ty)),
                    span,
                ));
                continue;
            }
            clauses.push((clause, ty));
        }
        let catch_types: Vec<TypeId> = clauses.iter().map(|&(_, t)| t).collect();

        let landing_bb = self.append_block("lpad");
        let dispatch_bb = self.append_block("catch.dispatch");
        let end_bb = self.append_block("try.end");
        let i8p = self.i8_ptr();
        let i32t = self.emitter.int_type(32);
        let pad_ty = self.emitter.literal_struct(&[i8p, i32t]);
        let pad_slot = self.entry_alloca(pad_ty, "pad");

        self.tries.push(TryFrame {
            landing_bb,
            pad_slot,
            dispatch_bb,
            catch_types: catch_types.clone(),
        });
        self.push_throw_frame();
        self.lower_stmt(body);
        let body_throws = self.pop_throw_frame();
        self.tries.pop();
        self.br_if_open(end_bb);

        let handled: Vec<TypeId> = if catches.is_empty() {
            body_throws.to_vec()
        } else {
            let escaping: ThrowSet = body_throws
                .iter()
                .copied()
                .filter(|t| !catch_types.contains(t))
                .collect();
            self.note_throws(&escaping);
            catch_types.clone()
        };

        self.emitter.position_at_end(landing_bb);
        let pad = self.emit_landing_pad(&handled, catches.is_empty());
        self.emitter.store(pad, pad_slot);
        self.emitter.br(dispatch_bb);

        self.emitter.position_at_end(dispatch_bb);
        let pad = self.emitter.load(pad_slot);
        let payload = self.emitter.extract_value(pad, 0);
        let selector = self.emitter.extract_value(pad, 1);
        if catches.is_empty() {
            self.dispatch_implicit(&handled, payload, selector, end_bb);
        } else {
            self.dispatch_clauses(&clauses, pad, payload, selector, end_bb);
        }
        self.emitter.position_at_end(end_bb);
    }

    /// The landing pad: this try's types first, then every enclosing
    /// try's, so an exception only an outer try handles still stops here
    /// and is forwarded through the dispatch chains.
    fn emit_landing_pad(&mut self, handled: &[TypeId], catch_all: bool) -> ValueId {
        let mut types: Vec<TypeId> = handled.to_vec();
        let mut catch_all = catch_all;
        for frame in self.tries.iter().rev() {
            if frame.catches_everything() {
                catch_all = true;
            }
            for &ty in &frame.catch_types {
                if !types.contains(&ty) {
                    types.push(ty);
                }
            }
        }
        let clauses: Vec<ValueId> = types.iter().map(|&t| self.type_descriptor(t)).collect();
        self.emitter.landing_pad(&clauses, catch_all)
    }

    fn dispatch_clauses(
        &mut self,
        clauses: &[(&CatchClause, TypeId)],
        pad: ValueId,
        payload: ValueId,
        selector: ValueId,
        end_bb: BlockId,
    ) {
        for &(clause, ty) in clauses {
            let hit = self.selector_is(selector, ty);
            let catch_bb = self.append_block("catch");
            let next_bb = self.append_block("catch.next");
            self.emitter.cond_br(hit, catch_bb, next_bb);

            self.emitter.position_at_end(catch_bb);
            self.lower_catch_body(Some((clause.binding, ty)), payload, clause.body, end_bb);
            self.emitter.position_at_end(next_bb);
        }
        // Not ours: the enclosing try's chain, or the caller.
        match self.tries.last().map(|t| (t.pad_slot, t.dispatch_bb)) {
            Some((outer_slot, outer_dispatch)) => {
                self.emitter.store(pad, outer_slot);
                self.emitter.br(outer_dispatch);
            }
            None => self.emitter.resume(pad),
        }
    }

    fn dispatch_implicit(&mut self, handled: &[TypeId], payload: ValueId, selector: ValueId, end_bb: BlockId) {
        let catch_bb = self.append_block("catch");
        for &ty in handled {
            let hit = self.selector_is(selector, ty);
            let next_bb = self.append_block("catch.next");
            self.emitter.cond_br(hit, catch_bb, next_bb);
            self.emitter.position_at_end(next_bb);
        }
        let abort = self.ctx.runtime.get(&mut *self.emitter, RuntimeFn::Abort);
        self.emit_call(abort, &[]);
        self.emitter.unreachable();

        self.emitter.position_at_end(catch_bb);
        self.lower_catch_body(None, payload, NodeId::INVALID, end_bb);
    }

    fn selector_is(&mut self, selector: ValueId, ty: TypeId) -> ValueId {
        let descriptor = self.type_descriptor(ty);
        let id = self.emitter.eh_typeid_for(descriptor);
        self.emitter.icmp(IntPredicate::Eq, selector, id)
    }

    /// Claim the exception, bind it by reference, run the handler, release.
    fn lower_catch_body(&mut self, binding: Option<(Name, TypeId)>, payload: ValueId, body: NodeId, end_bb: BlockId) {
        let begin = self.ctx.runtime.get(&mut *self.emitter, RuntimeFn::BeginCatch);
        let raw = self.emit_call(begin, &[payload]).unwrap_or(payload);

        let previous = binding.map(|(name, ty)| {
            let ptr_ty = self.emitter.pointer_type(ty);
            let typed = self.emitter.cast(CastOp::BitCast, raw, ptr_ty);
            let hidden = self.ctx.symbols.set_variable(
                name,
                VarBinding {
                    storage: typed,
                    value_ty: ty,
                    is_reference: true,
                },
            );
            (name, hidden)
        });

        self.lower_stmt(body);
        if !self.emitter.current_block_terminated() {
            let end = self.ctx.runtime.get(&mut *self.emitter, RuntimeFn::EndCatch);
            self.emit_call(end, &[]);
            self.emitter.br(end_bb);
        }

        if let Some((name, hidden)) = previous {
            match hidden {
                Some(b) => {
                    self.ctx.symbols.set_variable(name, b);
                }
                None => {
                    self.ctx.symbols.remove_variable(name);
                }
            }
        }
    }
}
