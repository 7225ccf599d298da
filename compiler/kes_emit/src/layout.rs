//! Data layout: sizes, alignments and struct field offsets.
//!
//! A 64-bit target with natural alignment. Shared by the recording
//! backend (for `sizeof` folding) and the interpreter (for memory).

use crate::types::{TypeData, TypeTable};
use crate::TypeId;

/// Pointer width in bytes.
pub const POINTER_SIZE: u64 = 8;

impl TypeTable {
    /// Allocation size in bytes, including trailing padding.
    pub fn size_of(&self, ty: TypeId) -> u64 {
        match self.data(ty) {
            TypeData::Void => 0,
            TypeData::Int(bits) | TypeData::Float(bits) => int_bytes(*bits),
            TypeData::Pointer(_) | TypeData::Function { .. } => POINTER_SIZE,
            TypeData::Array { elem, len } => self.size_of(*elem) * len,
            TypeData::Struct { fields, .. } => {
                let Some(fields) = fields else { return 0 };
                let mut offset = 0;
                for &f in fields {
                    offset = align_to(offset, self.align_of(f)) + self.size_of(f);
                }
                align_to(offset, self.align_of(ty))
            }
        }
    }

    /// ABI alignment in bytes.
    pub fn align_of(&self, ty: TypeId) -> u64 {
        match self.data(ty) {
            TypeData::Void => 1,
            TypeData::Int(bits) | TypeData::Float(bits) => int_bytes(*bits),
            TypeData::Pointer(_) | TypeData::Function { .. } => POINTER_SIZE,
            TypeData::Array { elem, .. } => self.align_of(*elem),
            TypeData::Struct { fields, .. } => fields
                .iter()
                .flatten()
                .map(|&f| self.align_of(f))
                .max()
                .unwrap_or(1),
        }
    }

    /// Byte offset of field `index`, `None` if out of range or opaque.
    pub fn field_offset(&self, ty: TypeId, index: u32) -> Option<u64> {
        let fields = self.struct_fields(ty)?;
        let index = index as usize;
        if index >= fields.len() {
            return None;
        }
        let mut offset = 0;
        for &f in &fields[..index] {
            offset = align_to(offset, self.align_of(f)) + self.size_of(f);
        }
        Some(align_to(offset, self.align_of(fields[index])))
    }
}

fn int_bytes(bits: u32) -> u64 {
    match bits {
        0..=8 => 1,
        9..=16 => 2,
        17..=32 => 4,
        _ => 8,
    }
}

fn align_to(offset: u64, align: u64) -> u64 {
    if align <= 1 {
        offset
    } else {
        offset.div_ceil(align) * align
    }
}
