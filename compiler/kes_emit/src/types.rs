//! Backend type table.
//!
//! Structural types (integers, floats, pointers, arrays, literal structs,
//! function signatures) are interned, so two requests for `i32*` return
//! the same [`TypeId`] and type equality is ID equality. Named structs are
//! nominal: each [`TypeTable::named_struct`] call creates a fresh type,
//! opaque until [`TypeTable::set_struct_body`] completes it.

use std::fmt::Write as _;

use rustc_hash::FxHashMap;

use crate::ids::{to_u32, TypeId};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum TypeData {
    Void,
    Int(u32),
    Float(u32),
    Pointer(TypeId),
    Array {
        elem: TypeId,
        len: u64,
    },
    Struct {
        name: Option<String>,
        fields: Option<Vec<TypeId>>,
    },
    Function {
        params: Vec<TypeId>,
        ret: TypeId,
        variadic: bool,
    },
}

/// Coarse classification of a backend type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    Int { bits: u32 },
    Float { bits: u32 },
    Pointer { pointee: TypeId },
    Array { elem: TypeId, len: u64 },
    Struct,
    Function,
}

impl TypeKind {
    pub fn is_int(self) -> bool {
        matches!(self, TypeKind::Int { .. })
    }

    pub fn is_float(self) -> bool {
        matches!(self, TypeKind::Float { .. })
    }

    pub fn is_pointer(self) -> bool {
        matches!(self, TypeKind::Pointer { .. })
    }
}

/// Signature of a function type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionSig {
    pub params: Vec<TypeId>,
    pub ret: TypeId,
    pub variadic: bool,
}

/// Interning table of backend types.
#[derive(Clone, Debug, Default)]
pub struct TypeTable {
    types: Vec<TypeData>,
    interned: FxHashMap<TypeData, TypeId>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, data: TypeData) -> TypeId {
        if let Some(&id) = self.interned.get(&data) {
            return id;
        }
        let id = TypeId::from_raw(to_u32(self.types.len()));
        self.types.push(data.clone());
        self.interned.insert(data, id);
        id
    }

    pub(crate) fn data(&self, ty: TypeId) -> &TypeData {
        &self.types[ty.index()]
    }

    pub fn void(&mut self) -> TypeId {
        self.intern(TypeData::Void)
    }

    pub fn int(&mut self, bits: u32) -> TypeId {
        self.intern(TypeData::Int(bits))
    }

    pub fn float(&mut self, bits: u32) -> TypeId {
        self.intern(TypeData::Float(bits))
    }

    pub fn pointer(&mut self, pointee: TypeId) -> TypeId {
        self.intern(TypeData::Pointer(pointee))
    }

    pub fn array(&mut self, elem: TypeId, len: u64) -> TypeId {
        self.intern(TypeData::Array { elem, len })
    }

    /// Anonymous struct, interned by field list.
    pub fn literal_struct(&mut self, fields: Vec<TypeId>) -> TypeId {
        self.intern(TypeData::Struct {
            name: None,
            fields: Some(fields),
        })
    }

    /// Fresh opaque named struct.
    pub fn named_struct(&mut self, name: &str) -> TypeId {
        let id = TypeId::from_raw(to_u32(self.types.len()));
        self.types.push(TypeData::Struct {
            name: Some(name.to_owned()),
            fields: None,
        });
        id
    }

    /// Complete a named struct. Returns `false` if `ty` is not a named
    /// struct or already has a body.
    pub fn set_struct_body(&mut self, ty: TypeId, body: Vec<TypeId>) -> bool {
        match &mut self.types[ty.index()] {
            TypeData::Struct {
                name: Some(_),
                fields: fields @ None,
            } => {
                *fields = Some(body);
                true
            }
            _ => false,
        }
    }

    pub fn function(&mut self, params: Vec<TypeId>, ret: TypeId, variadic: bool) -> TypeId {
        self.intern(TypeData::Function {
            params,
            ret,
            variadic,
        })
    }

    pub fn kind(&self, ty: TypeId) -> TypeKind {
        match *self.data(ty) {
            TypeData::Void => TypeKind::Void,
            TypeData::Int(bits) => TypeKind::Int { bits },
            TypeData::Float(bits) => TypeKind::Float { bits },
            TypeData::Pointer(pointee) => TypeKind::Pointer { pointee },
            TypeData::Array { elem, len } => TypeKind::Array { elem, len },
            TypeData::Struct { .. } => TypeKind::Struct,
            TypeData::Function { .. } => TypeKind::Function,
        }
    }

    /// Name of a named struct.
    pub fn struct_name(&self, ty: TypeId) -> Option<&str> {
        match self.data(ty) {
            TypeData::Struct { name, .. } => name.as_deref(),
            _ => None,
        }
    }

    /// Field types, `None` for opaque structs and non-structs.
    pub fn struct_fields(&self, ty: TypeId) -> Option<&[TypeId]> {
        match self.data(ty) {
            TypeData::Struct { fields, .. } => fields.as_deref(),
            _ => None,
        }
    }

    pub fn function_sig(&self, ty: TypeId) -> Option<FunctionSig> {
        match self.data(ty) {
            TypeData::Function {
                params,
                ret,
                variadic,
            } => Some(FunctionSig {
                params: params.clone(),
                ret: *ret,
                variadic: *variadic,
            }),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// LLVM-flavoured spelling (`i32`, `%Node*`, `{ i8*, i32 }`).
    pub fn display(&self, ty: TypeId) -> String {
        let mut out = String::new();
        self.write_type(ty, &mut out);
        out
    }

    fn write_type(&self, ty: TypeId, out: &mut String) {
        match self.data(ty) {
            TypeData::Void => out.push_str("void"),
            TypeData::Int(bits) => {
                let _ = write!(out, "i{bits}");
            }
            TypeData::Float(32) => out.push_str("float"),
            TypeData::Float(_) => out.push_str("double"),
            TypeData::Pointer(pointee) => {
                self.write_type(*pointee, out);
                out.push('*');
            }
            TypeData::Array { elem, len } => {
                let _ = write!(out, "[{len} x ");
                self.write_type(*elem, out);
                out.push(']');
            }
            TypeData::Struct { name: Some(name), .. } => {
                let _ = write!(out, "%\"{name}\"");
            }
            TypeData::Struct { name: None, fields } => {
                out.push_str("{ ");
                for (i, field) in fields.iter().flatten().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_type(*field, out);
                }
                out.push_str(" }");
            }
            TypeData::Function {
                params,
                ret,
                variadic,
            } => {
                self.write_type(*ret, out);
                out.push_str(" (");
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_type(*p, out);
                }
                if *variadic {
                    out.push_str(if params.is_empty() { "..." } else { ", ..." });
                }
                out.push(')');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_types_intern() {
        let mut t = TypeTable::new();
        let i32a = t.int(32);
        let i32b = t.int(32);
        assert_eq!(i32a, i32b);
        assert_eq!(t.pointer(i32a), t.pointer(i32b));
        assert_ne!(t.int(64), i32a);
    }

    #[test]
    fn named_structs_are_nominal() {
        let mut t = TypeTable::new();
        let a = t.named_struct("Node");
        let b = t.named_struct("Node");
        assert_ne!(a, b);
        assert_eq!(t.struct_fields(a), None);
        let i = t.int(32);
        let node_ptr = t.pointer(a);
        assert!(t.set_struct_body(a, vec![i, node_ptr]));
        assert!(!t.set_struct_body(a, vec![i]));
        assert_eq!(t.struct_fields(a), Some(&[i, node_ptr][..]));
        assert_eq!(t.display(node_ptr), "%\"Node\"*");
    }

    #[test]
    fn display_function_type() {
        let mut t = TypeTable::new();
        let i8p = {
            let i8t = t.int(8);
            t.pointer(i8t)
        };
        let i32t = t.int(32);
        let f = t.function(vec![i8p], i32t, true);
        assert_eq!(t.display(f), "i32 (i8*, ...)");
    }
}
