//! Constant folding at emission time.
//!
//! Each `fold_*` returns `Some` when every operand is a constant and the
//! operation can be evaluated at compile time; the caller emits a real
//! instruction otherwise. Division by zero is never folded.

use super::{Constant, IrModule, ValueDef};
use crate::ops::{
    eval_float, eval_int, normalize_int, round_float, zero_extend, BinOp, CastOp, FloatPredicate,
    IntPredicate,
};
use crate::{CodeEmitter, TypeId, TypeKind, ValueId};

impl IrModule {
    fn int_const(&self, v: ValueId) -> Option<(i64, u32)> {
        let data = self.value(v);
        match (&data.def, self.types.kind(data.ty)) {
            (ValueDef::Const(Constant::Int(i)), TypeKind::Int { bits }) => Some((*i, bits)),
            _ => None,
        }
    }

    fn float_const(&self, v: ValueId) -> Option<(f64, u32)> {
        let data = self.value(v);
        match (&data.def, self.types.kind(data.ty)) {
            (ValueDef::Const(Constant::Float(f)), TypeKind::Float { bits }) => Some((*f, bits)),
            _ => None,
        }
    }

    fn is_null_const(&self, v: ValueId) -> bool {
        matches!(self.value(v).def, ValueDef::Const(Constant::Null))
    }

    pub(super) fn fold_binary(&mut self, op: BinOp, lhs: ValueId, rhs: ValueId) -> Option<ValueId> {
        let ty = self.value(lhs).ty;
        if op.is_float() {
            let (a, bits) = self.float_const(lhs)?;
            let (b, _) = self.float_const(rhs)?;
            let v = eval_float(op, a, b, bits)?;
            return Some(self.const_float(ty, v));
        }
        let (a, bits) = self.int_const(lhs)?;
        let (b, _) = self.int_const(rhs)?;
        let v = eval_int(op, a, b, bits)?;
        Some(self.const_int(ty, v))
    }

    pub(super) fn fold_icmp(
        &mut self,
        pred: IntPredicate,
        lhs: ValueId,
        rhs: ValueId,
    ) -> Option<ValueId> {
        let result = if let (Some((a, _)), Some((b, _))) = (self.int_const(lhs), self.int_const(rhs))
        {
            pred.eval(a, b)
        } else if self.is_null_const(lhs) && self.is_null_const(rhs) {
            pred.eval(0, 0)
        } else {
            return None;
        };
        let i1 = self.types.int(1);
        Some(self.const_int(i1, i64::from(result)))
    }

    pub(super) fn fold_fcmp(
        &mut self,
        pred: FloatPredicate,
        lhs: ValueId,
        rhs: ValueId,
    ) -> Option<ValueId> {
        let (a, _) = self.float_const(lhs)?;
        let (b, _) = self.float_const(rhs)?;
        let i1 = self.types.int(1);
        Some(self.const_int(i1, i64::from(pred.eval(a, b))))
    }

    pub(super) fn fold_cast(&mut self, op: CastOp, value: ValueId, to: TypeId) -> Option<ValueId> {
        let to_kind = self.types.kind(to);
        match op {
            CastOp::Trunc | CastOp::SExt => {
                let (v, _) = self.int_const(value)?;
                Some(self.const_int(to, v))
            }
            CastOp::ZExt => {
                let (v, bits) = self.int_const(value)?;
                Some(self.const_int(to, zero_extend(v, bits)))
            }
            CastOp::FPTrunc | CastOp::FPExt => {
                let (v, _) = self.float_const(value)?;
                let TypeKind::Float { bits } = to_kind else {
                    return None;
                };
                Some(self.const_float(to, round_float(v, bits)))
            }
            CastOp::FPToSI => {
                let (v, _) = self.float_const(value)?;
                let TypeKind::Int { bits } = to_kind else {
                    return None;
                };
                Some(self.const_int(to, normalize_int(v as i64, bits)))
            }
            CastOp::SIToFP => {
                let (v, _) = self.int_const(value)?;
                Some(self.const_float(to, v as f64))
            }
            CastOp::PtrToInt => self
                .is_null_const(value)
                .then(|| self.const_int(to, 0)),
            CastOp::IntToPtr => match self.int_const(value) {
                Some((0, _)) => Some(self.const_null(to)),
                _ => None,
            },
            CastOp::BitCast => {
                // Address constants keep their definition under the new type.
                let def = self.value(value).def.clone();
                match def {
                    ValueDef::Const(Constant::Null)
                    | ValueDef::Global(_)
                    | ValueDef::Function(_) => Some(self.push_value(to, def)),
                    _ => None,
                }
            }
        }
    }
}
