//! Literals, names, and variable declarations.

use kes_diagnostic::Diagnostic;
use kes_emit::{TypeId, TypeKind, ValueId};
use kes_ir::{Name, NodeId, Span, TypeExpr, VarInit};

use super::{Lowerer, Operand};
use crate::symbols::VarBinding;

impl Lowerer<'_> {
    // -----------------------------------------------------------------------
    // Literals
    // -----------------------------------------------------------------------

    /// Integer literals are `int` when they fit, `long` otherwise.
    pub(crate) fn lower_int(&mut self, value: i64) -> Operand {
        let bits = if i32::try_from(value).is_ok() { 32 } else { 64 };
        let ty = self.emitter.int_type(bits);
        Operand::value(self.emitter.const_int(ty, value))
    }

    pub(crate) fn lower_float(&mut self, value: f64) -> Operand {
        let ty = self.emitter.float_type(64);
        Operand::value(self.emitter.const_float(ty, value))
    }

    pub(crate) fn lower_bool(&mut self, value: bool) -> Operand {
        let ty = self.emitter.int_type(1);
        Operand::value(self.emitter.const_int(ty, i64::from(value)))
    }

    pub(crate) fn lower_char(&mut self, value: u8) -> Operand {
        let ty = self.emitter.int_type(8);
        Operand::value(self.emitter.const_int(ty, i64::from(value)))
    }

    pub(crate) fn lower_string(&mut self, text: Name) -> Operand {
        let text = self.name_str(text);
        Operand::value(self.emitter.global_string(text))
    }

    /// `null` is a `char*` constant that converts to any pointer type.
    pub(crate) fn lower_null(&mut self) -> Operand {
        let ty = self.i8_ptr();
        Operand::value(self.emitter.const_null(ty))
    }

    /// Whether `value` is the `null` constant (not a string or function address).
    pub(crate) fn is_null_constant(&self, value: ValueId) -> bool {
        let ty = self.emitter.type_of(value);
        self.kind(ty).is_pointer() && self.emitter.is_constant(value) && !self.emitter.is_global(value)
    }

    // -----------------------------------------------------------------------
    // Names
    // -----------------------------------------------------------------------

    /// A variable, or a member of `this` inside a method.
    pub(crate) fn lower_ident(&mut self, name: Name, span: Span) -> Option<Operand> {
        if let Some(binding) = self.ctx.symbols.variable(name) {
            return Some(Operand::place(binding.storage));
        }
        if let Some(place) = self.implicit_member(name) {
            return Some(place);
        }
        self.error(Diagnostic::unresolved(
            format!("unknown variable '{}'", self.name_str(name)),
            span,
        ));
        None
    }

    /// `name` as `this.name` when lowering a method of an object that has it.
    fn implicit_member(&mut self, name: Name) -> Option<Operand> {
        let this_ty = self.func.as_ref()?.this_ty?;
        let slot = self.ctx.symbols.member(this_ty, name);
        if !slot.is_found() {
            return None;
        }
        let this = self.this_pointer()?;
        let index = u32::try_from(slot.index).ok()?;
        Some(Operand::place(self.emitter.struct_gep(this, index)))
    }

    /// The `this` pointer of the current method.
    pub(crate) fn this_pointer(&mut self) -> Option<ValueId> {
        let binding = *self.ctx.symbols.variable(self.this_name)?;
        Some(self.emitter.load(binding.storage))
    }

    pub(crate) fn lower_this(&mut self, span: Span) -> Option<Operand> {
        let in_method = self.func.as_ref().is_some_and(|f| f.this_ty.is_some());
        match self.this_pointer() {
            Some(this) if in_method => Some(Operand::value(this)),
            _ => {
                self.error(Diagnostic::unresolved("'this' used outside a method", span));
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Variable declarations
    // -----------------------------------------------------------------------

    /// `T a = x, b;`: every name shares the declared type. Inside a
    /// function the names are stack slots; at module scope they are globals
    /// with constant initializers.
    pub(crate) fn lower_var_decl(&mut self, ty: &TypeExpr, vars: &[VarInit], span: Span) {
        let Some(value_ty) = self.lower_type(ty.strip_reference(), span) else {
            return;
        };
        if self.kind(value_ty) == TypeKind::Void {
            self.error(Diagnostic::type_mismatch("variables cannot have type 'void'", span));
            return;
        }
        for var in vars {
            if ty.is_reference() {
                self.bind_reference(var, value_ty, span);
            } else if self.func.is_some() {
                self.declare_local(var, value_ty);
            } else {
                self.declare_global(var, value_ty);
            }
        }
    }

    fn declare_local(&mut self, var: &VarInit, value_ty: TypeId) {
        let slot = self.entry_alloca(value_ty, self.name_str(var.name));
        let init = if var.init.is_valid() {
            self.lower_value(var.init)
                .and_then(|v| self.coerce(v, value_ty, self.span(var.init)))
        } else {
            None
        };
        let init = init.unwrap_or_else(|| self.emitter.const_zero(value_ty));
        self.emitter.store(init, slot);
        self.ctx.symbols.set_variable(
            var.name,
            VarBinding {
                storage: slot,
                value_ty,
                is_reference: false,
            },
        );
    }

    fn declare_global(&mut self, var: &VarInit, value_ty: TypeId) {
        let name = self.name_str(var.name);
        let global = self.emitter.add_global(name, value_ty);
        self.ctx.symbols.set_variable(
            var.name,
            VarBinding {
                storage: global,
                value_ty,
                is_reference: false,
            },
        );
        tracing::debug!(name, ty = %self.describe(value_ty), "global declared");
        if var.init.is_valid() {
            if let Some(init) = self.constant_initializer(var.init, value_ty) {
                self.emitter.set_global_initializer(global, init);
            }
        }
    }

    /// Lower a global's initializer, which must fold to a constant.
    pub(crate) fn constant_initializer(&mut self, init: NodeId, ty: TypeId) -> Option<ValueId> {
        let span = self.span(init);
        let op = self.lower_required(init)?;
        if op.place {
            self.error(Diagnostic::structural(
                "global initializers must be constants",
                span,
            ));
            return None;
        }
        let value = self.coerce(op.value, ty, span)?;
        if !self.emitter.is_constant(value) {
            self.error(Diagnostic::structural(
                "global initializers must be constants",
                span,
            ));
            return None;
        }
        Some(value)
    }

    /// `T& r = place;` binds `r` to the place's address.
    fn bind_reference(&mut self, var: &VarInit, value_ty: TypeId, span: Span) {
        if !var.init.is_valid() {
            self.error(Diagnostic::structural(
                format!("reference '{}' must be initialized", self.name_str(var.name)),
                span,
            ));
            return;
        }
        let Some(op) = self.lower_required(var.init) else {
            return;
        };
        let init_ty = self.operand_ty(op);
        let address = if init_ty == value_ty {
            self.address_of(op)
        } else if self.pointee(init_ty) == Some(value_ty) {
            self.load_operand(op)
        } else {
            self.error(Diagnostic::type_mismatch(
                format!(
                    "cannot bind '{}&' to a value of type '{}'",
                    self.describe(value_ty),
                    self.describe(init_ty)
                ),
                span,
            ));
            return;
        };
        self.ctx.symbols.set_variable(
            var.name,
            VarBinding {
                storage: address,
                value_ty,
                is_reference: true,
            },
        );
    }
}
