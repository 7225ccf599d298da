//! Operators: binary, unary, assignment, casts, implicit conversions.
//!
//! Every operator asks the [`OperatorRegistry`](crate::operators::OperatorRegistry)
//! first. Only when no user-defined operator matches do the built-in
//! semantics apply, by backend type kind:
//!
//! | Operands | Built-in |
//! |----------|----------|
//! | int, int | widen to the wider width, then integer op |
//! | float, float | widen to the wider width, then float op |
//! | int, float | int converted to the float type |
//! | pointer, int | `+`/`-` offset the pointer |
//! | pointer, pointer | `==`/`!=` compare addresses |

use kes_diagnostic::Diagnostic;
use kes_emit::{BinOp, CastOp, FloatPredicate, IntPredicate, TypeId, TypeKind, ValueId};
use kes_ir::{BinaryOp, NodeId, OpSymbol, Span, TypeExpr, UnaryOp};

use super::{Lowerer, Operand};
use crate::operators::OperatorKey;
use crate::runtime_decl::RuntimeFn;
use crate::symbols::Resolution;
use crate::type_lower::{describe_list, widens};

/// Outcome of asking the registry for a user-defined operator.
pub(crate) enum UserOp {
    Found(usize),
    Missing,
    /// Ambiguous; already reported.
    Failed,
}

impl Lowerer<'_> {
    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    pub(crate) fn find_operator(&mut self, key: OperatorKey, span: Span) -> UserOp {
        if self.ctx.operators.is_empty() {
            return UserOp::Missing;
        }
        let resolution = {
            let types = crate::type_lower::EmitterTypes(&*self.emitter);
            self.ctx.operators.lookup(&types, key)
        };
        match resolution {
            Resolution::Found(index) => UserOp::Found(index),
            Resolution::NotFound => UserOp::Missing,
            Resolution::Ambiguous(count) => {
                let sides: Vec<TypeId> = key.lhs.into_iter().chain(key.rhs).collect();
                self.error(Diagnostic::overload(
                    format!(
                        "operator '{}' on {} is ambiguous between {count} overloads",
                        key.symbol,
                        describe_list(&*self.emitter, &sides)
                    ),
                    span,
                ));
                UserOp::Failed
            }
        }
    }

    /// Call registered operator `index` with `args` in parameter order.
    pub(crate) fn call_operator(&mut self, index: usize, args: &[Operand], span: Span) -> Option<Operand> {
        let Some(entry) = self.ctx.operators.get(index).cloned() else {
            self.set_fatal(crate::InternalError::VanishedOverload {
                name: format!("operator #{index}"),
            });
            return None;
        };
        let values = self.adapt_args(args, &entry.params, span)?;
        let result = self.emit_call(entry.function, &values);
        self.note_throws(&entry.throws);
        Self::call_result(result, entry.ret_ref)
    }

    // -----------------------------------------------------------------------
    // Binary
    // -----------------------------------------------------------------------

    pub(crate) fn lower_binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId, span: Span) -> Option<Operand> {
        let l = self.lower_required(lhs)?;
        let r = self.lower_required(rhs)?;
        self.apply_binary(op, l, r, span)
    }

    /// `l op r` on lowered operands: user operator, then built-in.
    pub(crate) fn apply_binary(&mut self, op: BinaryOp, l: Operand, r: Operand, span: Span) -> Option<Operand> {
        let lty = self.operand_ty(l);
        let rty = self.operand_ty(r);
        match self.find_operator(OperatorKey::binary(lty, OpSymbol::Binary(op), rty), span) {
            UserOp::Found(index) => return self.call_operator(index, &[l, r], span),
            UserOp::Failed => return None,
            UserOp::Missing => {}
        }
        let lv = self.load_operand(l);
        let rv = self.load_operand(r);
        let value = self.builtin_binary(op, lv, rv, span)?;
        Some(Operand::value(value))
    }

    fn builtin_binary(&mut self, op: BinaryOp, l: ValueId, r: ValueId, span: Span) -> Option<ValueId> {
        let lty = self.emitter.type_of(l);
        let rty = self.emitter.type_of(r);
        match (self.kind(lty), self.kind(rty)) {
            (TypeKind::Int { .. }, TypeKind::Int { .. }) => {
                let (l, r) = self.unify_numeric(l, r);
                self.int_binary(op, l, r, span)
            }
            (TypeKind::Float { .. } | TypeKind::Int { .. }, TypeKind::Float { .. })
            | (TypeKind::Float { .. }, TypeKind::Int { .. }) => {
                let (l, r) = self.unify_numeric(l, r);
                self.float_binary(op, l, r, span)
            }
            (TypeKind::Pointer { .. }, TypeKind::Int { .. }) if matches!(op, BinaryOp::Add | BinaryOp::Sub) => {
                let i64t = self.emitter.int_type(64);
                let mut offset = self.convert(r, i64t)?;
                if op == BinaryOp::Sub {
                    let zero = self.emitter.const_int(i64t, 0);
                    offset = self.emitter.binary(BinOp::Sub, zero, offset);
                }
                Some(self.emitter.gep(l, offset))
            }
            (TypeKind::Pointer { .. }, TypeKind::Pointer { .. }) if matches!(op, BinaryOp::Eq | BinaryOp::Ne) => {
                let i64t = self.emitter.int_type(64);
                let li = self.emitter.cast(CastOp::PtrToInt, l, i64t);
                let ri = self.emitter.cast(CastOp::PtrToInt, r, i64t);
                let pred = if op == BinaryOp::Eq { IntPredicate::Eq } else { IntPredicate::Ne };
                Some(self.emitter.icmp(pred, li, ri))
            }
            _ => {
                self.operand_error(op, lty, rty, span);
                None
            }
        }
    }

    fn operand_error(&mut self, op: BinaryOp, lty: TypeId, rty: TypeId, span: Span) {
        self.error(Diagnostic::type_mismatch(
            format!(
                "operator '{op}' cannot be applied to '{}' and '{}'",
                self.describe(lty),
                self.describe(rty)
            ),
            span,
        ));
    }

    /// Widen the narrower of two numeric operands to the other's type.
    fn unify_numeric(&mut self, l: ValueId, r: ValueId) -> (ValueId, ValueId) {
        let lty = self.emitter.type_of(l);
        let rty = self.emitter.type_of(r);
        if lty == rty {
            return (l, r);
        }
        let target = match (self.kind(lty), self.kind(rty)) {
            (TypeKind::Int { bits: a }, TypeKind::Int { bits: b }) => {
                if a >= b {
                    lty
                } else {
                    rty
                }
            }
            (TypeKind::Float { bits: a }, TypeKind::Float { bits: b }) => {
                if a >= b {
                    lty
                } else {
                    rty
                }
            }
            (TypeKind::Float { .. }, _) => lty,
            _ => rty,
        };
        let l = self.convert(l, target).unwrap_or(l);
        let r = self.convert(r, target).unwrap_or(r);
        (l, r)
    }

    fn int_binary(&mut self, op: BinaryOp, l: ValueId, r: ValueId, span: Span) -> Option<ValueId> {
        let arith = match op {
            BinaryOp::Add => BinOp::Add,
            BinaryOp::Sub => BinOp::Sub,
            BinaryOp::Mul => BinOp::Mul,
            BinaryOp::Div => BinOp::SDiv,
            BinaryOp::Rem => BinOp::SRem,
            BinaryOp::BitAnd => BinOp::And,
            BinaryOp::BitOr => BinOp::Or,
            BinaryOp::BitXor => BinOp::Xor,
            BinaryOp::Shl => BinOp::Shl,
            BinaryOp::Shr => BinOp::AShr,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let pred = int_predicate(op)?;
                return Some(self.emitter.icmp(pred, l, r));
            }
            BinaryOp::Pow => {
                let ty = self.emitter.type_of(l);
                let f64t = self.emitter.float_type(64);
                let lf = self.convert(l, f64t)?;
                let rf = self.convert(r, f64t)?;
                let result = self.call_pow(lf, rf)?;
                return self.convert(result, ty);
            }
            BinaryOp::Range => {
                let ty = self.emitter.type_of(l);
                self.operand_error(op, ty, ty, span);
                return None;
            }
        };
        Some(self.emitter.binary(arith, l, r))
    }

    fn float_binary(&mut self, op: BinaryOp, l: ValueId, r: ValueId, span: Span) -> Option<ValueId> {
        let arith = match op {
            BinaryOp::Add => BinOp::FAdd,
            BinaryOp::Sub => BinOp::FSub,
            BinaryOp::Mul => BinOp::FMul,
            BinaryOp::Div => BinOp::FDiv,
            BinaryOp::Rem => BinOp::FRem,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let pred = float_predicate(op)?;
                return Some(self.emitter.fcmp(pred, l, r));
            }
            BinaryOp::Pow => {
                let ty = self.emitter.type_of(l);
                let f64t = self.emitter.float_type(64);
                let lf = self.convert(l, f64t)?;
                let rf = self.convert(r, f64t)?;
                let result = self.call_pow(lf, rf)?;
                return self.convert(result, ty);
            }
            BinaryOp::BitAnd
            | BinaryOp::BitOr
            | BinaryOp::BitXor
            | BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::Range => {
                let ty = self.emitter.type_of(l);
                self.operand_error(op, ty, ty, span);
                return None;
            }
        };
        Some(self.emitter.binary(arith, l, r))
    }

    fn call_pow(&mut self, base: ValueId, exp: ValueId) -> Option<ValueId> {
        let pow = self.ctx.runtime.get(&mut *self.emitter, RuntimeFn::Pow);
        self.emit_call(pow, &[base, exp])
    }

    // -----------------------------------------------------------------------
    // Unary
    // -----------------------------------------------------------------------

    pub(crate) fn lower_unary(&mut self, op: UnaryOp, operand: NodeId, span: Span) -> Option<Operand> {
        let inner = self.lower_required(operand)?;
        let ty = self.operand_ty(inner);
        match self.find_operator(OperatorKey::prefix(OpSymbol::Unary(op), ty), span) {
            UserOp::Found(index) => return self.call_operator(index, &[inner], span),
            UserOp::Failed => return None,
            UserOp::Missing => {}
        }
        match op {
            UnaryOp::AddressOf => {
                if inner.place {
                    Some(Operand::value(inner.value))
                } else {
                    self.error(Diagnostic::type_mismatch(
                        "cannot take the address of a temporary value",
                        span,
                    ));
                    None
                }
            }
            UnaryOp::Deref => {
                if self.pointee(ty).is_some() {
                    let address = self.load_operand(inner);
                    Some(Operand::place(address))
                } else {
                    self.unary_error(op, ty, span);
                    None
                }
            }
            UnaryOp::Neg => {
                let v = self.load_operand(inner);
                let result = match self.kind(ty) {
                    TypeKind::Int { bits } if bits > 1 => {
                        let zero = self.emitter.const_int(ty, 0);
                        self.emitter.binary(BinOp::Sub, zero, v)
                    }
                    TypeKind::Float { .. } => {
                        let zero = self.emitter.const_float(ty, 0.0);
                        self.emitter.binary(BinOp::FSub, zero, v)
                    }
                    _ => {
                        self.unary_error(op, ty, span);
                        return None;
                    }
                };
                Some(Operand::value(result))
            }
            UnaryOp::Not => {
                let v = self.load_operand(inner);
                let Some(truth) = self.to_bool(v, span) else {
                    return None;
                };
                let i1 = self.emitter.int_type(1);
                let one = self.emitter.const_int(i1, 1);
                Some(Operand::value(self.emitter.binary(BinOp::Xor, truth, one)))
            }
            UnaryOp::BitNot => {
                let v = self.load_operand(inner);
                if !self.kind(ty).is_int() {
                    self.unary_error(op, ty, span);
                    return None;
                }
                let ones = self.emitter.const_int(ty, -1);
                Some(Operand::value(self.emitter.binary(BinOp::Xor, v, ones)))
            }
        }
    }

    fn unary_error(&mut self, op: UnaryOp, ty: TypeId, span: Span) {
        self.error(Diagnostic::type_mismatch(
            format!("operator '{op}' cannot be applied to '{}'", self.describe(ty)),
            span,
        ));
    }

    // -----------------------------------------------------------------------
    // Assignment
    // -----------------------------------------------------------------------

    /// `target = value` / `target op= value`. Yields the target place.
    pub(crate) fn lower_assign(
        &mut self,
        op: Option<BinaryOp>,
        target: NodeId,
        value: NodeId,
        span: Span,
    ) -> Option<Operand> {
        let place = self.lower_required(target)?;
        if !place.place {
            self.error(Diagnostic::type_mismatch(
                "left side of assignment is not assignable",
                span,
            ));
            return None;
        }
        let target_ty = self.operand_ty(place);

        if self.func.is_none() {
            if !self.emitter.is_global(place.value) {
                self.error(Diagnostic::structural(
                    "module-scope assignment must target a global",
                    span,
                ));
                return None;
            }
            let init = self.constant_initializer(value, target_ty)?;
            self.emitter.set_global_initializer(place.value, init);
            return Some(place);
        }

        let new_value = match op {
            None => self.lower_value(value)?,
            Some(bop) => {
                let rhs = self.lower_required(value)?;
                let combined = self.apply_binary(bop, place, rhs, span)?;
                self.load_operand(combined)
            }
        };
        let new_value = self.coerce(new_value, target_ty, span)?;
        self.emitter.store(new_value, place.value);
        Some(place)
    }

    // -----------------------------------------------------------------------
    // Casts and conversions
    // -----------------------------------------------------------------------

    /// `expr as T`: a user `as` operator on the source type, else the
    /// built-in cast matrix.
    pub(crate) fn lower_cast(&mut self, expr: NodeId, ty: &TypeExpr, span: Span) -> Option<Operand> {
        let target = self.lower_type(ty, span)?;
        let op = self.lower_required(expr)?;
        let source = self.operand_ty(op);
        let key = OperatorKey {
            lhs: Some(source),
            symbol: OpSymbol::As,
            rhs: Some(target),
        };
        match self.find_operator(key, span) {
            UserOp::Found(index) => return self.call_operator(index, &[op], span),
            UserOp::Failed => return None,
            UserOp::Missing => {}
        }
        let value = self.load_operand(op);
        if let Some(converted) = self.convert(value, target) {
            return Some(Operand::value(converted));
        }
        self.error(Diagnostic::type_mismatch(
            format!(
                "cannot cast '{}' to '{}'",
                self.describe(source),
                self.describe(target)
            ),
            span,
        ));
        None
    }

    /// The cast matrix: int/int by width, int/float, float/float,
    /// pointer/int, pointer/pointer. `None` for any other pair.
    pub(crate) fn convert(&mut self, value: ValueId, to: TypeId) -> Option<ValueId> {
        let from = self.emitter.type_of(value);
        if from == to {
            return Some(value);
        }
        let converted = match (self.kind(from), self.kind(to)) {
            (TypeKind::Int { .. }, TypeKind::Int { bits: 1 }) => {
                let zero = self.emitter.const_int(from, 0);
                self.emitter.icmp(IntPredicate::Ne, value, zero)
            }
            (TypeKind::Int { bits: 1 }, TypeKind::Int { .. }) => self.emitter.cast(CastOp::ZExt, value, to),
            (TypeKind::Int { bits: a }, TypeKind::Int { bits: b }) => {
                let op = if a < b { CastOp::SExt } else { CastOp::Trunc };
                self.emitter.cast(op, value, to)
            }
            (TypeKind::Int { bits: 1 }, TypeKind::Float { .. }) => {
                let i32t = self.emitter.int_type(32);
                let wide = self.emitter.cast(CastOp::ZExt, value, i32t);
                self.emitter.cast(CastOp::SIToFP, wide, to)
            }
            (TypeKind::Int { .. }, TypeKind::Float { .. }) => self.emitter.cast(CastOp::SIToFP, value, to),
            (TypeKind::Float { .. }, TypeKind::Int { bits: 1 }) => {
                let zero = self.emitter.const_float(from, 0.0);
                self.emitter.fcmp(FloatPredicate::One, value, zero)
            }
            (TypeKind::Float { .. }, TypeKind::Int { .. }) => self.emitter.cast(CastOp::FPToSI, value, to),
            (TypeKind::Float { bits: a }, TypeKind::Float { bits: b }) => {
                let op = if a < b { CastOp::FPExt } else { CastOp::FPTrunc };
                self.emitter.cast(op, value, to)
            }
            (TypeKind::Pointer { .. }, TypeKind::Int { bits: 1 }) => {
                let i64t = self.emitter.int_type(64);
                let address = self.emitter.cast(CastOp::PtrToInt, value, i64t);
                let zero = self.emitter.const_int(i64t, 0);
                self.emitter.icmp(IntPredicate::Ne, address, zero)
            }
            (TypeKind::Pointer { .. }, TypeKind::Int { .. }) => self.emitter.cast(CastOp::PtrToInt, value, to),
            (TypeKind::Int { .. }, TypeKind::Pointer { .. }) => self.emitter.cast(CastOp::IntToPtr, value, to),
            (TypeKind::Pointer { .. }, TypeKind::Pointer { .. }) => self.emitter.cast(CastOp::BitCast, value, to),
            _ => return None,
        };
        Some(converted)
    }

    /// Implicit conversion of `value` to `to`: identity, lossless
    /// widening, `null` to any pointer, and integer or float constants to
    /// any type of the same kind.
    pub(crate) fn coerce(&mut self, value: ValueId, to: TypeId, span: Span) -> Option<ValueId> {
        let from = self.emitter.type_of(value);
        if from == to {
            return Some(value);
        }
        let to_kind = self.kind(to);
        let implicit = widens(&*self.emitter, from, to)
            || (to_kind.is_pointer() && self.is_null_constant(value))
            || (self.emitter.is_constant(value)
                && ((self.kind(from).is_int() && to_kind.is_int() && to_kind != TypeKind::Int { bits: 1 })
                    || (self.kind(from).is_float() && to_kind.is_float())));
        if implicit {
            if let Some(converted) = self.convert(value, to) {
                return Some(converted);
            }
        }
        self.error(Diagnostic::type_mismatch(
            format!(
                "expected '{}', found '{}'",
                self.describe(to),
                self.describe(from)
            ),
            span,
        ));
        None
    }

    /// Truth value of a scalar: nonzero numbers and non-null pointers.
    pub(crate) fn to_bool(&mut self, value: ValueId, span: Span) -> Option<ValueId> {
        let ty = self.emitter.type_of(value);
        let i1 = self.emitter.int_type(1);
        match self.kind(ty) {
            TypeKind::Int { .. } | TypeKind::Float { .. } | TypeKind::Pointer { .. } => self.convert(value, i1),
            _ => {
                self.error(Diagnostic::type_mismatch(
                    format!("expected a condition, found '{}'", self.describe(ty)),
                    span,
                ));
                None
            }
        }
    }
}

pub(crate) fn int_predicate(op: BinaryOp) -> Option<IntPredicate> {
    Some(match op {
        BinaryOp::Eq => IntPredicate::Eq,
        BinaryOp::Ne => IntPredicate::Ne,
        BinaryOp::Lt => IntPredicate::Slt,
        BinaryOp::Le => IntPredicate::Sle,
        BinaryOp::Gt => IntPredicate::Sgt,
        BinaryOp::Ge => IntPredicate::Sge,
        _ => return None,
    })
}

pub(crate) fn float_predicate(op: BinaryOp) -> Option<FloatPredicate> {
    Some(match op {
        BinaryOp::Eq => FloatPredicate::Oeq,
        BinaryOp::Ne => FloatPredicate::One,
        BinaryOp::Lt => FloatPredicate::Olt,
        BinaryOp::Le => FloatPredicate::Ole,
        BinaryOp::Gt => FloatPredicate::Ogt,
        BinaryOp::Ge => FloatPredicate::Oge,
        _ => return None,
    })
}
