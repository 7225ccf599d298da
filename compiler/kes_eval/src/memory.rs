//! Flat byte-addressed memory.
//!
//! Two regions share one limit: the heap (globals, `calloc`, exception
//! payloads) starting just above the null page, and the stack (allocas)
//! starting at [`STACK_BASE`]. The stack is unwound by resetting its top
//! when a call returns; the heap is a bump allocator and `free` only
//! updates accounting.

use kes_emit::{TypeId, TypeKind, TypeTable};

use crate::value::Val;
use crate::ExecError;

/// First heap address; everything below is the null page.
const HEAP_BASE: u64 = 16;
/// First stack address.
pub const STACK_BASE: u64 = 1 << 40;

pub struct Memory {
    heap: Vec<u8>,
    stack: Vec<u8>,
    limit: u64,
    pub(crate) live_allocations: u64,
}

impl Memory {
    pub fn new(limit: u64) -> Self {
        Memory {
            heap: Vec::new(),
            stack: Vec::new(),
            limit,
            live_allocations: 0,
        }
    }

    fn used(&self) -> u64 {
        (self.heap.len() + self.stack.len()) as u64
    }

    fn grow(region: &mut Vec<u8>, size: u64, align: u64) -> u64 {
        let align = align.max(1) as usize;
        let start = region.len().div_ceil(align) * align;
        region.resize(start + size as usize, 0);
        start as u64
    }

    fn check_limit(&self, size: u64) -> Result<(), ExecError> {
        if self.used() + size > self.limit {
            return Err(ExecError::OutOfMemory {
                requested: size,
                limit: self.limit,
            });
        }
        Ok(())
    }

    /// Zeroed heap allocation.
    pub fn alloc_heap(&mut self, size: u64, align: u64) -> Result<u64, ExecError> {
        self.check_limit(size + align)?;
        let offset = Self::grow(&mut self.heap, size.max(1), align);
        self.live_allocations += 1;
        Ok(HEAP_BASE + offset)
    }

    /// Zeroed stack allocation.
    pub fn alloc_stack(&mut self, size: u64, align: u64) -> Result<u64, ExecError> {
        self.check_limit(size + align)?;
        let offset = Self::grow(&mut self.stack, size.max(1), align);
        Ok(STACK_BASE + offset)
    }

    pub fn free(&mut self, addr: u64) {
        if addr != 0 {
            self.live_allocations = self.live_allocations.saturating_sub(1);
        }
    }

    /// Current stack top, restored by [`Memory::reset_stack`].
    pub fn stack_mark(&self) -> usize {
        self.stack.len()
    }

    pub fn reset_stack(&mut self, mark: usize) {
        self.stack.truncate(mark);
    }

    fn slice(&self, addr: u64, len: u64) -> Result<&[u8], ExecError> {
        let bad = || ExecError::BadAccess { addr, len };
        let (region, offset) = self.locate(addr).ok_or_else(bad)?;
        let start = usize::try_from(offset).map_err(|_| bad())?;
        let end = start.checked_add(len as usize).ok_or_else(bad)?;
        region.get(start..end).ok_or_else(bad)
    }

    fn slice_mut(&mut self, addr: u64, len: u64) -> Result<&mut [u8], ExecError> {
        let bad = || ExecError::BadAccess { addr, len };
        let (is_stack, offset) = if addr >= STACK_BASE {
            (true, addr - STACK_BASE)
        } else if addr >= HEAP_BASE {
            (false, addr - HEAP_BASE)
        } else {
            return Err(bad());
        };
        let region = if is_stack {
            &mut self.stack
        } else {
            &mut self.heap
        };
        let start = usize::try_from(offset).map_err(|_| bad())?;
        let end = start.checked_add(len as usize).ok_or_else(bad)?;
        region.get_mut(start..end).ok_or_else(bad)
    }

    fn locate(&self, addr: u64) -> Option<(&Vec<u8>, u64)> {
        if addr >= STACK_BASE {
            Some((&self.stack, addr - STACK_BASE))
        } else if addr >= HEAP_BASE {
            Some((&self.heap, addr - HEAP_BASE))
        } else {
            None
        }
    }

    pub fn read_bytes(&self, addr: u64, len: u64) -> Result<Vec<u8>, ExecError> {
        Ok(self.slice(addr, len)?.to_vec())
    }

    pub fn write_bytes(&mut self, addr: u64, bytes: &[u8]) -> Result<(), ExecError> {
        self.slice_mut(addr, bytes.len() as u64)?
            .copy_from_slice(bytes);
        Ok(())
    }

    /// Read a NUL-terminated string.
    pub fn read_c_string(&self, addr: u64) -> Result<String, ExecError> {
        let mut out = Vec::new();
        let mut cursor = addr;
        loop {
            let byte = self.slice(cursor, 1)?[0];
            if byte == 0 {
                break;
            }
            out.push(byte);
            cursor += 1;
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    fn read_uint(&self, addr: u64, size: u64) -> Result<u64, ExecError> {
        let bytes = self.slice(addr, size)?;
        let mut buf = [0u8; 8];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    fn write_uint(&mut self, addr: u64, size: u64, value: u64) -> Result<(), ExecError> {
        let bytes = value.to_le_bytes();
        self.write_bytes(addr, &bytes[..size as usize])
    }

    /// Load a value of type `ty`.
    pub fn read(&self, types: &TypeTable, addr: u64, ty: TypeId) -> Result<Val, ExecError> {
        match types.kind(ty) {
            TypeKind::Int { bits } => {
                let raw = self.read_uint(addr, types.size_of(ty))?;
                Ok(Val::Int(kes_emit::ops::normalize_int(raw as i64, bits)))
            }
            TypeKind::Float { bits: 32 } => {
                let raw = self.read_uint(addr, 4)?;
                Ok(Val::Float(f64::from(f32::from_bits(raw as u32))))
            }
            TypeKind::Float { .. } => Ok(Val::Float(f64::from_bits(self.read_uint(addr, 8)?))),
            TypeKind::Pointer { .. } | TypeKind::Function => {
                Ok(Val::Ptr(self.read_uint(addr, kes_emit::POINTER_SIZE)?))
            }
            TypeKind::Struct => {
                let fields = types.struct_fields(ty).unwrap_or(&[]);
                let mut out = Vec::with_capacity(fields.len());
                for (i, &f) in fields.iter().enumerate() {
                    let off = types.field_offset(ty, i as u32).unwrap_or(0);
                    out.push(self.read(types, addr + off, f)?);
                }
                Ok(Val::Agg(out))
            }
            TypeKind::Array { elem, len } => {
                let size = types.size_of(elem);
                let mut out = Vec::with_capacity(len as usize);
                for i in 0..len {
                    out.push(self.read(types, addr + i * size, elem)?);
                }
                Ok(Val::Agg(out))
            }
            TypeKind::Void => Ok(Val::Void),
        }
    }

    /// Store `val` as type `ty`.
    pub fn write(
        &mut self,
        types: &TypeTable,
        addr: u64,
        ty: TypeId,
        val: &Val,
    ) -> Result<(), ExecError> {
        match (types.kind(ty), val) {
            (TypeKind::Int { .. }, v) => {
                let raw = v.as_int().ok_or_else(|| mismatch(ty, val))?;
                self.write_uint(addr, types.size_of(ty), raw as u64)
            }
            (TypeKind::Float { bits: 32 }, Val::Float(f)) => {
                self.write_uint(addr, 4, u64::from((*f as f32).to_bits()))
            }
            (TypeKind::Float { .. }, Val::Float(f)) => self.write_uint(addr, 8, f.to_bits()),
            (TypeKind::Pointer { .. } | TypeKind::Function, v) => {
                let raw = v.as_ptr().ok_or_else(|| mismatch(ty, val))?;
                self.write_uint(addr, kes_emit::POINTER_SIZE, raw)
            }
            (TypeKind::Struct, Val::Agg(items)) => {
                let fields = types.struct_fields(ty).unwrap_or(&[]);
                for (i, (&f, item)) in fields.iter().zip(items).enumerate() {
                    let off = types.field_offset(ty, i as u32).unwrap_or(0);
                    self.write(types, addr + off, f, item)?;
                }
                Ok(())
            }
            (TypeKind::Array { elem, .. }, Val::Agg(items)) => {
                let size = types.size_of(elem);
                for (i, item) in items.iter().enumerate() {
                    self.write(types, addr + i as u64 * size, elem, item)?;
                }
                Ok(())
            }
            (TypeKind::Void, _) => Ok(()),
            _ => Err(mismatch(ty, val)),
        }
    }
}

fn mismatch(ty: TypeId, val: &Val) -> ExecError {
    ExecError::MalformedIr(format!("cannot store {val:?} as {ty:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_page_faults() {
        let mem = Memory::new(1024);
        assert!(matches!(
            mem.read_bytes(0, 4),
            Err(ExecError::BadAccess { addr: 0, len: 4 })
        ));
    }

    #[test]
    fn heap_roundtrip_and_zeroing() {
        let mut types = TypeTable::new();
        let i32t = types.int(32);
        let mut mem = Memory::new(1024);
        let a = mem.alloc_heap(8, 4).unwrap_or(0);
        assert_eq!(mem.read(&types, a, i32t), Ok(Val::Int(0)));
        mem.write(&types, a, i32t, &Val::Int(-7)).unwrap_or(());
        assert_eq!(mem.read(&types, a, i32t), Ok(Val::Int(-7)));
    }

    #[test]
    fn stack_resets() {
        let mut mem = Memory::new(1024);
        let mark = mem.stack_mark();
        let a = mem.alloc_stack(16, 8).unwrap_or(0);
        assert!(a >= STACK_BASE);
        mem.reset_stack(mark);
        assert!(mem.read_bytes(a, 1).is_err());
    }

    #[test]
    fn limit_is_enforced() {
        let mut mem = Memory::new(64);
        assert!(matches!(
            mem.alloc_heap(128, 1),
            Err(ExecError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn c_strings() {
        let mut mem = Memory::new(1024);
        let a = mem.alloc_heap(4, 1).unwrap_or(0);
        mem.write_bytes(a, b"hi\0").unwrap_or(());
        assert_eq!(mem.read_c_string(a), Ok("hi".to_owned()));
    }
}
