//! The built-in dynamic array `Array<T>`.
//!
//! Layout `{ T* data, long len, long cap }`. Each instance gets three
//! synthesized operators, emitted directly rather than lowered from source:
//!
//! | Operator | Behaviour |
//! |----------|-----------|
//! | `Array<T>& [] long -> T&` | bounds-checked element access, `abort` when out of range |
//! | `Array<T>& << T -> Array<T>&` | append; a full buffer is reallocated at twice the capacity (4 when empty) |
//! | `delete Array<T>&` | frees the buffer and resets the array to empty |

use kes_diagnostic::Diagnostic;
use kes_emit::{BinOp, CastOp, FunctionId, IntPredicate, TypeId, TypeKind, ValueId};
use kes_ir::{BinaryOp, OpSymbol, Span};

use super::Lowerer;
use crate::error::InternalError;
use crate::operators::{OperatorEntry, OperatorKey};
use crate::runtime_decl::RuntimeFn;
use crate::symbols::{ParamSig, ThrowSet};

const DATA: u32 = 0;
const LEN: u32 = 1;
const CAP: u32 = 2;

impl Lowerer<'_> {
    pub(crate) fn build_dynarray(&mut self, ty: TypeId, elem: TypeId) {
        if self.kind(elem) == TypeKind::Void {
            self.error(Diagnostic::type_mismatch(
                "arrays of 'void' are not allowed",
                Span::DUMMY,
            ));
            return;
        }
        let elem_ptr = self.emitter.pointer_type(elem);
        let i64t = self.emitter.int_type(64);
        self.emitter.set_struct_body(ty, &[elem_ptr, i64t, i64t]);
        let names = ["data", "len", "cap"].map(|n| self.interner.intern(n));
        let name = self.describe(ty);
        match self.ctx.symbols.object_by_type_mut(ty) {
            Some(desc) => {
                desc.members = vec![(names[0], elem_ptr), (names[1], i64t), (names[2], i64t)];
                desc.complete = true;
            }
            None => {
                self.set_fatal(InternalError::MissingObject { name });
                return;
            }
        }

        let here = self.emitter.current_block();
        self.array_index(ty, elem);
        self.array_append(ty, elem);
        self.array_delete(ty);
        match here {
            Some(bb) => self.emitter.position_at_end(bb),
            None => self.emitter.clear_position(),
        }
        tracing::debug!(array = %self.describe(ty), "dynamic array synthesized");
    }

    /// Declare a synthesized operator function and register it.
    fn synth_operator(
        &mut self,
        key: OperatorKey,
        params: Vec<ParamSig>,
        ret: TypeId,
        ret_ref: bool,
    ) -> Option<FunctionId> {
        let symbol = self.mangle(&format!("operator{}", key.symbol), &params);
        let mut backend = Vec::with_capacity(params.len());
        for p in &params {
            backend.push(if p.is_reference {
                self.emitter.pointer_type(p.ty)
            } else {
                p.ty
            });
        }
        let backend_ret = if ret_ref {
            self.emitter.pointer_type(ret)
        } else {
            ret
        };
        let fn_ty = self.emitter.function_type(&backend, backend_ret, false);
        let function = self.emitter.declare_function(&symbol, fn_ty);
        let entry = OperatorEntry {
            function,
            params,
            ret,
            ret_ref,
            throws: ThrowSet::new(),
        };
        if self.ctx.operators.insert(key, entry).is_err() {
            self.error(Diagnostic::structural(
                format!("operator '{symbol}' is already declared"),
                Span::DUMMY,
            ));
            return None;
        }
        Some(function)
    }

    fn array_index(&mut self, ty: TypeId, elem: TypeId) {
        let i64t = self.emitter.int_type(64);
        let key = OperatorKey::binary(ty, OpSymbol::Index, i64t);
        let params = vec![ParamSig::reference(ty), ParamSig::value(i64t)];
        let Some(f) = self.synth_operator(key, params, elem, true) else {
            return;
        };

        let entry = self.emitter.append_block(f, "entry");
        let oob = self.emitter.append_block(f, "out_of_bounds");
        let ok = self.emitter.append_block(f, "in_bounds");
        self.emitter.position_at_end(entry);
        let array = self.emitter.param(f, 0);
        let index = self.emitter.param(f, 1);
        let len_ptr = self.emitter.struct_gep(array, LEN);
        let len = self.emitter.load(len_ptr);
        let zero = self.emitter.const_int(i64t, 0);
        let negative = self.emitter.icmp(IntPredicate::Slt, index, zero);
        let past_end = self.emitter.icmp(IntPredicate::Sge, index, len);
        let bad = self.emitter.binary(BinOp::Or, negative, past_end);
        self.emitter.cond_br(bad, oob, ok);

        self.emitter.position_at_end(oob);
        let abort = self.ctx.runtime.get(&mut *self.emitter, RuntimeFn::Abort);
        self.emitter.call(abort, &[]);
        self.emitter.unreachable();

        self.emitter.position_at_end(ok);
        let data_ptr = self.emitter.struct_gep(array, DATA);
        let data = self.emitter.load(data_ptr);
        let slot = self.emitter.gep(data, index);
        self.emitter.ret(Some(slot));
    }

    fn array_append(&mut self, ty: TypeId, elem: TypeId) {
        let key = OperatorKey::binary(ty, OpSymbol::Binary(BinaryOp::Shl), elem);
        let params = vec![ParamSig::reference(ty), ParamSig::value(elem)];
        let Some(f) = self.synth_operator(key, params, ty, true) else {
            return;
        };
        let i64t = self.emitter.int_type(64);
        let elem_ptr = self.emitter.pointer_type(elem);
        let elem_size = i64::try_from(self.emitter.size_of(elem).max(1)).unwrap_or(i64::MAX);

        let entry = self.emitter.append_block(f, "entry");
        let grow = self.emitter.append_block(f, "grow");
        let first = self.emitter.append_block(f, "grow.first");
        let double = self.emitter.append_block(f, "grow.double");
        let alloc = self.emitter.append_block(f, "grow.alloc");
        let copy_cond = self.emitter.append_block(f, "copy.cond");
        let copy_body = self.emitter.append_block(f, "copy.body");
        let copy_done = self.emitter.append_block(f, "copy.done");
        let free_old = self.emitter.append_block(f, "grow.free");
        let commit = self.emitter.append_block(f, "grow.commit");
        let push = self.emitter.append_block(f, "push");

        // entry: full?
        self.emitter.position_at_end(entry);
        let array = self.emitter.param(f, 0);
        let value = self.emitter.param(f, 1);
        let counter = self.emitter.alloca(i64t, "i");
        let data_ptr = self.emitter.struct_gep(array, DATA);
        let len_ptr = self.emitter.struct_gep(array, LEN);
        let cap_ptr = self.emitter.struct_gep(array, CAP);
        let len = self.emitter.load(len_ptr);
        let cap = self.emitter.load(cap_ptr);
        let zero = self.emitter.const_int(i64t, 0);
        let one = self.emitter.const_int(i64t, 1);
        let full = self.emitter.icmp(IntPredicate::Eq, len, cap);
        self.emitter.cond_br(full, grow, push);

        // grow: new capacity
        self.emitter.position_at_end(grow);
        let empty = self.emitter.icmp(IntPredicate::Eq, cap, zero);
        self.emitter.cond_br(empty, first, double);
        self.emitter.position_at_end(first);
        let four = self.emitter.const_int(i64t, 4);
        self.emitter.br(alloc);
        self.emitter.position_at_end(double);
        let two = self.emitter.const_int(i64t, 2);
        let doubled = self.emitter.binary(BinOp::Mul, cap, two);
        self.emitter.br(alloc);

        self.emitter.position_at_end(alloc);
        let new_cap = self.emitter.phi(i64t, &[(four, first), (doubled, double)]);
        let size = self.emitter.const_int(i64t, elem_size);
        let calloc = self.ctx.runtime.get(&mut *self.emitter, RuntimeFn::Calloc);
        let raw = self.emitter.call(calloc, &[new_cap, size]);
        let new_data = match raw {
            Some(raw) => self.emitter.cast(CastOp::BitCast, raw, elem_ptr),
            None => self.emitter.const_null(elem_ptr),
        };
        let old_data = self.emitter.load(data_ptr);
        self.emitter.store(zero, counter);
        self.emitter.br(copy_cond);

        // copy the old elements over
        self.emitter.position_at_end(copy_cond);
        let i = self.emitter.load(counter);
        let more = self.emitter.icmp(IntPredicate::Slt, i, len);
        self.emitter.cond_br(more, copy_body, copy_done);
        self.emitter.position_at_end(copy_body);
        let src = self.emitter.gep(old_data, i);
        let moved = self.emitter.load(src);
        let dst = self.emitter.gep(new_data, i);
        self.emitter.store(moved, dst);
        let next = self.emitter.binary(BinOp::Add, i, one);
        self.emitter.store(next, counter);
        self.emitter.br(copy_cond);

        // the first buffer was never allocated
        self.emitter.position_at_end(copy_done);
        let had_buffer = self.emitter.icmp(IntPredicate::Ne, cap, zero);
        self.emitter.cond_br(had_buffer, free_old, commit);
        self.emitter.position_at_end(free_old);
        self.free_buffer(old_data);
        self.emitter.br(commit);

        self.emitter.position_at_end(commit);
        self.emitter.store(new_data, data_ptr);
        self.emitter.store(new_cap, cap_ptr);
        self.emitter.br(push);

        self.emitter.position_at_end(push);
        let data = self.emitter.load(data_ptr);
        let slot = self.emitter.gep(data, len);
        self.emitter.store(value, slot);
        let grown = self.emitter.binary(BinOp::Add, len, one);
        self.emitter.store(grown, len_ptr);
        self.emitter.ret(Some(array));
    }

    fn array_delete(&mut self, ty: TypeId) {
        let key = OperatorKey::postfix(ty, OpSymbol::Delete);
        let void = self.emitter.void_type();
        let Some(f) = self.synth_operator(key, vec![ParamSig::reference(ty)], void, false) else {
            return;
        };
        let i64t = self.emitter.int_type(64);

        let entry = self.emitter.append_block(f, "entry");
        let free = self.emitter.append_block(f, "free");
        let reset = self.emitter.append_block(f, "reset");
        self.emitter.position_at_end(entry);
        let array = self.emitter.param(f, 0);
        let data_ptr = self.emitter.struct_gep(array, DATA);
        let len_ptr = self.emitter.struct_gep(array, LEN);
        let cap_ptr = self.emitter.struct_gep(array, CAP);
        let cap = self.emitter.load(cap_ptr);
        let zero = self.emitter.const_int(i64t, 0);
        let had_buffer = self.emitter.icmp(IntPredicate::Ne, cap, zero);
        self.emitter.cond_br(had_buffer, free, reset);

        self.emitter.position_at_end(free);
        let data = self.emitter.load(data_ptr);
        self.free_buffer(data);
        self.emitter.br(reset);

        self.emitter.position_at_end(reset);
        let elem_ptr = self.emitter.type_of(data);
        let null = self.emitter.const_null(elem_ptr);
        self.emitter.store(null, data_ptr);
        self.emitter.store(zero, len_ptr);
        self.emitter.store(zero, cap_ptr);
        self.emitter.ret(None);
    }

    fn free_buffer(&mut self, data: ValueId) {
        let i8p = self.i8_ptr();
        let raw = self.emitter.cast(CastOp::BitCast, data, i8p);
        let free = self.ctx.runtime.get(&mut *self.emitter, RuntimeFn::Free);
        self.emitter.call(free, &[raw]);
    }
}
