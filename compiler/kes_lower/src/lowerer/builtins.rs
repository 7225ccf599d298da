//! Built-in statements and expressions backed by the C runtime.

use kes_diagnostic::Diagnostic;
use kes_emit::{CastOp, TypeKind, ValueId};
use kes_ir::{Name, NodeId, NodeRange, Span, TypeExpr};

use super::{Lowerer, Operand};
use crate::runtime_decl::RuntimeFn;

impl Lowerer<'_> {
    /// `print a, b, c`: the values separated by spaces, then a newline.
    pub(crate) fn lower_print(&mut self, args: NodeRange, span: Span) {
        let ast = self.ast;
        let mut format = String::new();
        let mut values = Vec::with_capacity(args.len());
        for (i, &arg) in ast.list(args).iter().enumerate() {
            let Some(value) = self.lower_value(arg) else {
                return;
            };
            let Some((spec, value)) = self.printf_arg(value, span) else {
                return;
            };
            if i > 0 {
                format.push(' ');
            }
            format.push_str(spec);
            values.push(value);
        }
        format.push('\n');
        self.emit_printf(&format, &values);
    }

    /// `expr!`: prints `line N: value` when debug prints are enabled and
    /// evaluates to `expr` either way.
    pub(crate) fn lower_debug_print(&mut self, expr: NodeId, span: Span) -> Option<Operand> {
        let op = self.lower_required(expr)?;
        if !self.ctx.options.debug_prints {
            return Some(op);
        }
        let value = self.load_operand(op);
        let (spec, arg) = self.printf_arg(value, span)?;
        let line = self.const_i32(i64::from(span.line));
        self.emit_printf(&format!("line %d: {spec}\n"), &[line, arg]);
        Some(Operand::value(value))
    }

    pub(crate) fn lower_asm(&mut self, text: Name) {
        let text = self.name_str(text);
        self.emitter.inline_asm(text);
    }

    /// `sizeof(T)` as a `long` constant.
    pub(crate) fn lower_size_of(&mut self, ty: &TypeExpr, span: Span) -> Option<Operand> {
        let ty = self.lower_type(ty, span)?;
        let size = i64::try_from(self.emitter.size_of(ty)).unwrap_or(i64::MAX);
        Some(Operand::value(self.const_i64(size)))
    }

    /// Conversion spec for one `printf` argument, with the value promoted
    /// the way C varargs are.
    fn printf_arg(&mut self, value: ValueId, span: Span) -> Option<(&'static str, ValueId)> {
        let ty = self.emitter.type_of(value);
        let i32t = self.emitter.int_type(32);
        match self.kind(ty) {
            TypeKind::Int { bits: 1 } => Some(("%d", self.emitter.cast(CastOp::ZExt, value, i32t))),
            TypeKind::Int { bits: 8 } => Some(("%c", self.emitter.cast(CastOp::SExt, value, i32t))),
            TypeKind::Int { bits } if bits < 32 => Some(("%d", self.emitter.cast(CastOp::SExt, value, i32t))),
            TypeKind::Int { bits: 32 } => Some(("%d", value)),
            TypeKind::Int { .. } => Some(("%ld", value)),
            TypeKind::Float { bits: 64 } => Some(("%g", value)),
            TypeKind::Float { .. } => {
                let f64t = self.emitter.float_type(64);
                Some(("%g", self.emitter.cast(CastOp::FPExt, value, f64t)))
            }
            TypeKind::Pointer { pointee } if self.kind(pointee) == (TypeKind::Int { bits: 8 }) => {
                Some(("%s", value))
            }
            TypeKind::Pointer { .. } => Some(("%p", value)),
            _ => {
                self.error(Diagnostic::type_mismatch(
                    format!("cannot print a value of type '{}'", self.describe(ty)),
                    span,
                ));
                None
            }
        }
    }

    fn emit_printf(&mut self, format: &str, args: &[ValueId]) {
        let printf = self.ctx.runtime.get(&mut *self.emitter, RuntimeFn::Printf);
        let mut values = Vec::with_capacity(args.len() + 1);
        values.push(self.emitter.global_string(format));
        values.extend_from_slice(args);
        self.emit_call(printf, &values);
    }
}
