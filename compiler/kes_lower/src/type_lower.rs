//! Backend-type helpers shared by the lowerer.
//!
//! Surface types lower to backend types in `Lowerer::lower_type`, which
//! needs the object table and the template instantiator. What lives here
//! only needs the emitter: primitive widths, rendering backend types back
//! to surface names, and the relations overload matching asks about.

use kes_emit::{CodeEmitter, TypeId, TypeKind};
use kes_ir::PrimType;

use crate::symbols::TypeRelation;

pub fn lower_prim(emitter: &mut dyn CodeEmitter, prim: PrimType) -> TypeId {
    match prim {
        PrimType::Bool => emitter.int_type(1),
        PrimType::Char => emitter.int_type(8),
        PrimType::Short => emitter.int_type(16),
        PrimType::Int => emitter.int_type(32),
        PrimType::Long => emitter.int_type(64),
        PrimType::Float => emitter.float_type(32),
        PrimType::Double => emitter.float_type(64),
        PrimType::Void => emitter.void_type(),
    }
}

/// Surface spelling of a backend type: `int`, `char*`, `List<int>`.
pub fn describe_type(emitter: &dyn CodeEmitter, ty: TypeId) -> String {
    if ty.is_none() {
        return "<unknown>".to_owned();
    }
    match emitter.type_kind(ty) {
        TypeKind::Void => "void".to_owned(),
        TypeKind::Int { bits: 1 } => "bool".to_owned(),
        TypeKind::Int { bits: 8 } => "char".to_owned(),
        TypeKind::Int { bits: 16 } => "short".to_owned(),
        TypeKind::Int { bits: 32 } => "int".to_owned(),
        TypeKind::Int { bits: 64 } => "long".to_owned(),
        TypeKind::Float { bits: 32 } => "float".to_owned(),
        TypeKind::Float { bits: 64 } => "double".to_owned(),
        TypeKind::Pointer { pointee } => format!("{}*", describe_type(emitter, pointee)),
        TypeKind::Struct => emitter
            .struct_name(ty)
            .unwrap_or_else(|| emitter.type_name(ty)),
        _ => emitter.type_name(ty),
    }
}

/// Comma-separated type list for messages: `(int, Point*)`.
pub fn describe_list(emitter: &dyn CodeEmitter, tys: &[TypeId]) -> String {
    let parts: Vec<String> = tys.iter().map(|&t| describe_type(emitter, t)).collect();
    format!("({})", parts.join(", "))
}

/// Lossless implicit conversion: narrower int to wider int (not from or
/// to `bool`), narrower float to wider float, and int to float.
pub fn widens(emitter: &dyn CodeEmitter, from: TypeId, to: TypeId) -> bool {
    match (emitter.type_kind(from), emitter.type_kind(to)) {
        (TypeKind::Int { bits: a }, TypeKind::Int { bits: b }) => a > 1 && a < b,
        (TypeKind::Float { bits: a }, TypeKind::Float { bits: b }) => a < b,
        (TypeKind::Int { bits }, TypeKind::Float { .. }) => bits > 1,
        _ => false,
    }
}

pub fn pointee(emitter: &dyn CodeEmitter, ty: TypeId) -> Option<TypeId> {
    match emitter.type_kind(ty) {
        TypeKind::Pointer { pointee } => Some(pointee),
        _ => None,
    }
}

/// [`TypeRelation`] answered by an emitter.
pub struct EmitterTypes<'e>(pub &'e dyn CodeEmitter);

impl TypeRelation for EmitterTypes<'_> {
    fn pointee(&self, ty: TypeId) -> Option<TypeId> {
        pointee(self.0, ty)
    }
}

#[cfg(test)]
mod tests {
    use kes_emit::IrModule;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn backend_types_read_back_as_surface_names() {
        let mut m = IrModule::new("t");
        let int = lower_prim(&mut m, PrimType::Int);
        let int_ptr = m.pointer_type(int);
        let list = m.opaque_struct("List<int>");
        let list_ptr = m.pointer_type(list);
        assert_eq!(describe_type(&m, int_ptr), "int*");
        assert_eq!(describe_type(&m, list_ptr), "List<int>*");
        let b = lower_prim(&mut m, PrimType::Bool);
        let d = lower_prim(&mut m, PrimType::Double);
        assert_eq!(describe_list(&m, &[b, d]), "(bool, double)");
    }

    #[test]
    fn widening_is_one_way() {
        let mut m = IrModule::new("t");
        let b = lower_prim(&mut m, PrimType::Bool);
        let c = lower_prim(&mut m, PrimType::Char);
        let i = lower_prim(&mut m, PrimType::Int);
        let l = lower_prim(&mut m, PrimType::Long);
        let f = lower_prim(&mut m, PrimType::Float);
        let d = lower_prim(&mut m, PrimType::Double);
        assert!(widens(&m, c, i));
        assert!(widens(&m, i, l));
        assert!(!widens(&m, l, i));
        assert!(!widens(&m, b, i));
        assert!(widens(&m, f, d));
        assert!(widens(&m, i, d));
        assert!(!widens(&m, d, i));
    }
}
