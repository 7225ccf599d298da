//! Surface type expressions.
//!
//! A `TypeExpr` is what the parser produced for a type annotation. It is
//! lowered to a backend type by the lowering core; here it only knows its
//! canonical spelling and whether it is a reference.

use std::fmt::Write as _;

use crate::{Name, StringInterner};

/// Built-in primitive types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrimType {
    Bool,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
}

impl PrimType {
    /// Source spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            PrimType::Bool => "bool",
            PrimType::Char => "char",
            PrimType::Short => "short",
            PrimType::Int => "int",
            PrimType::Long => "long",
            PrimType::Float => "float",
            PrimType::Double => "double",
            PrimType::Void => "void",
        }
    }

    /// Parse a primitive keyword.
    pub fn from_keyword(s: &str) -> Option<Self> {
        Some(match s {
            "bool" => PrimType::Bool,
            "char" => PrimType::Char,
            "short" => PrimType::Short,
            "int" => PrimType::Int,
            "long" => PrimType::Long,
            "float" => PrimType::Float,
            "double" => PrimType::Double,
            "void" => PrimType::Void,
            _ => return None,
        })
    }
}

/// A surface type expression.
///
/// `Clone` is a deep copy; a declaration such as `int a = 1, b = 2;`
/// hands each declared name its own copy of the shared type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// `int`, `double`, ...
    Prim(PrimType),
    /// `T*`
    Pointer(Box<TypeExpr>),
    /// `T&`: same representation as `T*`, auto-dereferenced on use.
    Reference(Box<TypeExpr>),
    /// A named object type (or a template placeholder inside a blueprint).
    Named(Name),
    /// `Name<A, B>`: a template instantiation.
    Generic { name: Name, args: Vec<TypeExpr> },
    /// `T[]`: the built-in dynamic array.
    Array(Box<TypeExpr>),
}

impl TypeExpr {
    /// Canonical name of the built-in dynamic array blueprint.
    pub const ARRAY_NAME: &'static str = "Array";

    pub fn int() -> Self {
        TypeExpr::Prim(PrimType::Int)
    }

    pub fn void() -> Self {
        TypeExpr::Prim(PrimType::Void)
    }

    /// Wrap in a pointer.
    #[must_use]
    pub fn pointer_to(self) -> Self {
        TypeExpr::Pointer(Box::new(self))
    }

    /// Wrap in a reference.
    #[must_use]
    pub fn reference_to(self) -> Self {
        TypeExpr::Reference(Box::new(self))
    }

    /// True only for `T&`.
    pub fn is_reference(&self) -> bool {
        matches!(self, TypeExpr::Reference(_))
    }

    /// True for `void` (not `void*`).
    pub fn is_void(&self) -> bool {
        matches!(self, TypeExpr::Prim(PrimType::Void))
    }

    /// The type a reference refers to; other types are returned as-is.
    pub fn strip_reference(&self) -> &TypeExpr {
        match self {
            TypeExpr::Reference(inner) => inner,
            other => other,
        }
    }

    /// Canonical textual form, used as a cache key for instantiations.
    pub fn name(&self, interner: &StringInterner) -> String {
        let mut out = String::new();
        self.write_name(interner, &mut out);
        out
    }

    fn write_name(&self, interner: &StringInterner, out: &mut String) {
        match self {
            TypeExpr::Prim(p) => out.push_str(p.as_str()),
            TypeExpr::Pointer(inner) => {
                inner.write_name(interner, out);
                out.push('*');
            }
            TypeExpr::Reference(inner) => {
                inner.write_name(interner, out);
                out.push('&');
            }
            TypeExpr::Named(name) => out.push_str(interner.lookup(*name)),
            TypeExpr::Generic { name, args } => {
                out.push_str(interner.lookup(*name));
                out.push('<');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    arg.write_name(interner, out);
                }
                out.push('>');
            }
            TypeExpr::Array(elem) => {
                let _ = write!(out, "{}<", Self::ARRAY_NAME);
                elem.write_name(interner, out);
                out.push('>');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names() {
        let interner = StringInterner::new();
        let list = interner.intern("List");
        let ty = TypeExpr::Generic {
            name: list,
            args: vec![TypeExpr::int(), TypeExpr::int().pointer_to()],
        };
        assert_eq!(ty.name(&interner), "List<int,int*>");
        assert_eq!(
            TypeExpr::Array(Box::new(TypeExpr::Prim(PrimType::Double))).name(&interner),
            "Array<double>"
        );
        assert_eq!(TypeExpr::int().reference_to().name(&interner), "int&");
    }

    #[test]
    fn reference_flag() {
        assert!(TypeExpr::int().reference_to().is_reference());
        assert!(!TypeExpr::int().pointer_to().is_reference());
        assert_eq!(
            TypeExpr::int().reference_to().strip_reference(),
            &TypeExpr::int()
        );
    }

    #[test]
    fn clone_is_independent() {
        let interner = StringInterner::new();
        let original = TypeExpr::int().pointer_to();
        let mut copy = original.clone();
        if let TypeExpr::Pointer(inner) = &mut copy {
            **inner = TypeExpr::Prim(PrimType::Long);
        }
        assert_eq!(original.name(&interner), "int*");
        assert_eq!(copy.name(&interner), "long*");
    }

    #[test]
    fn keywords_roundtrip() {
        for p in [PrimType::Bool, PrimType::Int, PrimType::Double, PrimType::Void] {
            assert_eq!(PrimType::from_keyword(p.as_str()), Some(p));
        }
        assert_eq!(PrimType::from_keyword("string"), None);
    }
}
