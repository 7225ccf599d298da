//! Surface types to backend types.

use kes_diagnostic::Diagnostic;
use kes_emit::TypeId;
use kes_ir::{PrimType, Span, TypeExpr};

use super::Lowerer;
use crate::symbols::ObjectDesc;
use crate::type_lower::lower_prim;

impl Lowerer<'_> {
    /// Lower a type annotation. Unknown names are reported.
    pub(crate) fn lower_type(&mut self, ty: &TypeExpr, span: Span) -> Option<TypeId> {
        self.lower_type_in(ty, false, span)
    }

    /// Like [`Lowerer::lower_type`], but an unknown name becomes a fresh
    /// opaque object, to be completed by its declaration.
    pub(crate) fn probe_type(&mut self, ty: &TypeExpr, span: Span) -> Option<TypeId> {
        self.lower_type_in(ty, true, span)
    }

    fn lower_type_in(&mut self, ty: &TypeExpr, probe: bool, span: Span) -> Option<TypeId> {
        match ty {
            TypeExpr::Prim(prim) => Some(lower_prim(&mut *self.emitter, *prim)),
            TypeExpr::Pointer(inner) | TypeExpr::Reference(inner) => {
                // `void*` is a byte pointer.
                let pointee = match **inner {
                    TypeExpr::Prim(PrimType::Void) => self.emitter.int_type(8),
                    ref other => self.lower_type_in(other, probe, span)?,
                };
                Some(self.emitter.pointer_type(pointee))
            }
            TypeExpr::Named(name) => {
                if let Some(desc) = self.ctx.symbols.object(*name) {
                    return Some(desc.ty);
                }
                let text = self.name_str(*name);
                if self.ctx.templates.has_name(*name) {
                    self.error(Diagnostic::type_mismatch(
                        format!("template '{text}' needs type arguments"),
                        span,
                    ));
                    return None;
                }
                if !probe {
                    self.error(Diagnostic::unresolved(format!("unknown type '{text}'"), span));
                    return None;
                }
                let opaque = self.emitter.opaque_struct(text);
                self.ctx.symbols.declare_object(ObjectDesc::new(*name, opaque));
                Some(opaque)
            }
            TypeExpr::Generic { name, args } => {
                let mut lowered = Vec::with_capacity(args.len());
                for arg in args {
                    lowered.push(self.lower_type_in(arg, probe, span)?);
                }
                self.instantiate(*name, &lowered, span)
            }
            TypeExpr::Array(elem) => {
                let elem = self.lower_type_in(elem, probe, span)?;
                let array = self.ctx.templates.array_name();
                self.instantiate(array, &[elem], span)
            }
        }
    }
}
