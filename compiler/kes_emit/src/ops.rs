//! Instruction opcodes and predicates.

use std::fmt;

/// Two-operand arithmetic and bitwise opcodes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    SRem,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
    And,
    Or,
    Xor,
    Shl,
    AShr,
}

impl BinOp {
    pub fn is_float(self) -> bool {
        matches!(
            self,
            BinOp::FAdd | BinOp::FSub | BinOp::FMul | BinOp::FDiv | BinOp::FRem
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::SDiv => "sdiv",
            BinOp::SRem => "srem",
            BinOp::FAdd => "fadd",
            BinOp::FSub => "fsub",
            BinOp::FMul => "fmul",
            BinOp::FDiv => "fdiv",
            BinOp::FRem => "frem",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::Shl => "shl",
            BinOp::AShr => "ashr",
        }
    }
}

/// Signed integer (and pointer) comparison predicates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl IntPredicate {
    pub fn as_str(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
        }
    }

    pub fn eval<T: PartialOrd>(self, a: T, b: T) -> bool {
        match self {
            IntPredicate::Eq => a == b,
            IntPredicate::Ne => a != b,
            IntPredicate::Slt => a < b,
            IntPredicate::Sle => a <= b,
            IntPredicate::Sgt => a > b,
            IntPredicate::Sge => a >= b,
        }
    }
}

/// Ordered float comparison predicates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FloatPredicate {
    Oeq,
    One,
    Olt,
    Ole,
    Ogt,
    Oge,
}

impl FloatPredicate {
    pub fn as_str(self) -> &'static str {
        match self {
            FloatPredicate::Oeq => "oeq",
            FloatPredicate::One => "one",
            FloatPredicate::Olt => "olt",
            FloatPredicate::Ole => "ole",
            FloatPredicate::Ogt => "ogt",
            FloatPredicate::Oge => "oge",
        }
    }

    /// Ordered: any comparison involving NaN is false.
    pub fn eval(self, a: f64, b: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        match self {
            FloatPredicate::Oeq => a == b,
            FloatPredicate::One => a != b,
            FloatPredicate::Olt => a < b,
            FloatPredicate::Ole => a <= b,
            FloatPredicate::Ogt => a > b,
            FloatPredicate::Oge => a >= b,
        }
    }
}

/// Conversion opcodes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CastOp {
    Trunc,
    SExt,
    ZExt,
    FPTrunc,
    FPExt,
    FPToSI,
    SIToFP,
    PtrToInt,
    IntToPtr,
    BitCast,
}

impl CastOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CastOp::Trunc => "trunc",
            CastOp::SExt => "sext",
            CastOp::ZExt => "zext",
            CastOp::FPTrunc => "fptrunc",
            CastOp::FPExt => "fpext",
            CastOp::FPToSI => "fptosi",
            CastOp::SIToFP => "sitofp",
            CastOp::PtrToInt => "ptrtoint",
            CastOp::IntToPtr => "inttoptr",
            CastOp::BitCast => "bitcast",
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for CastOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sign-extend the low `bits` of `v`; `i1` stays 0/1.
pub fn normalize_int(v: i64, bits: u32) -> i64 {
    match bits {
        0 => 0,
        1 => v & 1,
        b if b >= 64 => v,
        _ => {
            let shift = 64 - bits;
            (v << shift) >> shift
        }
    }
}

/// Zero-extend the low `bits` of `v`.
pub fn zero_extend(v: i64, bits: u32) -> i64 {
    if bits >= 64 {
        v
    } else {
        v & ((1i64 << bits) - 1)
    }
}

/// Evaluate an integer opcode on two normalized operands of width `bits`.
///
/// Returns `None` for division by zero and for float opcodes.
pub fn eval_int(op: BinOp, a: i64, b: i64, bits: u32) -> Option<i64> {
    let v = match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::SDiv => {
            if b == 0 {
                return None;
            }
            a.wrapping_div(b)
        }
        BinOp::SRem => {
            if b == 0 {
                return None;
            }
            a.wrapping_rem(b)
        }
        BinOp::And => a & b,
        BinOp::Or => a | b,
        BinOp::Xor => a ^ b,
        BinOp::Shl => a.wrapping_shl((b as u32) % bits.max(1)),
        BinOp::AShr => a.wrapping_shr((b as u32) % bits.max(1)),
        BinOp::FAdd | BinOp::FSub | BinOp::FMul | BinOp::FDiv | BinOp::FRem => return None,
    };
    Some(normalize_int(v, bits))
}

/// Evaluate a float opcode; `None` for integer opcodes.
pub fn eval_float(op: BinOp, a: f64, b: f64, bits: u32) -> Option<f64> {
    let v = match op {
        BinOp::FAdd => a + b,
        BinOp::FSub => a - b,
        BinOp::FMul => a * b,
        BinOp::FDiv => a / b,
        BinOp::FRem => a % b,
        _ => return None,
    };
    Some(round_float(v, bits))
}

/// Round to `f32` precision when `bits == 32`.
pub fn round_float(v: f64, bits: u32) -> f64 {
    if bits == 32 {
        f64::from(v as f32)
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_wraps_to_width() {
        assert_eq!(normalize_int(200, 8), -56);
        assert_eq!(normalize_int(3, 1), 1);
        assert_eq!(normalize_int(i64::from(i32::MAX) + 1, 32), i64::from(i32::MIN));
        assert_eq!(zero_extend(-1, 8), 255);
    }

    #[test]
    fn int_eval() {
        assert_eq!(eval_int(BinOp::Add, 2, 3, 32), Some(5));
        assert_eq!(eval_int(BinOp::SDiv, 7, 0, 32), None);
        assert_eq!(eval_int(BinOp::SRem, -7, 2, 32), Some(-1));
        assert_eq!(eval_int(BinOp::Shl, 1, 4, 32), Some(16));
    }

    #[test]
    fn predicates() {
        assert!(IntPredicate::Sle.eval(2, 2));
        assert!(!FloatPredicate::Oeq.eval(f64::NAN, f64::NAN));
        assert!(FloatPredicate::Olt.eval(1.0, 2.0));
    }
}
