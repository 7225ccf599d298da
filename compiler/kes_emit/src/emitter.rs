//! The `CodeEmitter` trait: the narrow boundary between lowering and a
//! concrete backend.
//!
//! Lowering only ever holds `&mut dyn CodeEmitter` and the `Copy` IDs it
//! hands out, so it never depends on a backend's internals and can be run
//! against [`IrModule`](crate::IrModule) (or any other implementation) in
//! tests.
//!
//! # Method Organization
//!
//! | Category | Methods |
//! |----------|---------|
//! | Types | `int_type`, `float_type`, `pointer_type`, `function_type`, `opaque_struct`, ... |
//! | Functions | `declare_function`, `get_function`, `param`, `function_ptr`, ... |
//! | Blocks | `append_block`, `position_at_end`, `current_block`, ... |
//! | Constants | `const_int`, `const_float`, `const_null`, `const_zero`, `const_struct`, ... |
//! | Globals | `add_global`, `set_global_initializer`, `global_string` |
//! | Instructions | `binary`, `icmp`, `fcmp`, `cast`, `alloca`, `load`, `store`, `call`, ... |
//! | Exceptions | `invoke`, `landing_pad`, `eh_typeid_for`, `resume`, `set_personality` |
//! | Terminators | `br`, `cond_br`, `ret`, `unreachable` |

use crate::ops::{BinOp, CastOp, FloatPredicate, IntPredicate};
use crate::{BlockId, FunctionId, FunctionSig, TypeId, TypeKind, ValueId};

/// Backend-agnostic instruction emitter.
///
/// Instructions are appended at the current insertion point. When there is
/// none (module scope), implementations may fold constants but must still
/// return a usable handle.
pub trait CodeEmitter {
    // -- Types --

    fn int_type(&mut self, bits: u32) -> TypeId;
    fn float_type(&mut self, bits: u32) -> TypeId;
    fn void_type(&mut self) -> TypeId;
    fn pointer_type(&mut self, pointee: TypeId) -> TypeId;
    fn function_type(&mut self, params: &[TypeId], ret: TypeId, variadic: bool) -> TypeId;
    /// Anonymous struct type, interned by field list.
    fn literal_struct(&mut self, fields: &[TypeId]) -> TypeId;
    /// Fresh named struct with no body yet.
    fn opaque_struct(&mut self, name: &str) -> TypeId;
    /// Complete a named struct. Returns `false` if it already has a body.
    fn set_struct_body(&mut self, ty: TypeId, fields: &[TypeId]) -> bool;
    /// Field types, `None` while opaque.
    fn struct_fields(&self, ty: TypeId) -> Option<Vec<TypeId>>;
    fn struct_name(&self, ty: TypeId) -> Option<String>;
    fn type_kind(&self, ty: TypeId) -> TypeKind;
    fn function_sig(&self, ty: TypeId) -> Option<FunctionSig>;
    fn type_of(&self, value: ValueId) -> TypeId;
    fn size_of(&self, ty: TypeId) -> u64;
    /// Textual form of a type for logs.
    fn type_name(&self, ty: TypeId) -> String;

    // -- Functions --

    /// Declare (or return the existing) function `name` of type `fn_ty`.
    fn declare_function(&mut self, name: &str, fn_ty: TypeId) -> FunctionId;
    fn get_function(&self, name: &str) -> Option<FunctionId>;
    fn function_name(&self, f: FunctionId) -> String;
    fn function_type_of(&self, f: FunctionId) -> TypeId;
    fn param(&mut self, f: FunctionId, index: u32) -> ValueId;
    /// Address of a function, usable as a constant.
    fn function_ptr(&mut self, f: FunctionId) -> ValueId;
    fn set_personality(&mut self, f: FunctionId, personality: FunctionId);

    // -- Blocks --

    fn append_block(&mut self, f: FunctionId, name: &str) -> BlockId;
    fn position_at_end(&mut self, bb: BlockId);
    /// Drop the insertion point (module scope).
    fn clear_position(&mut self);
    fn current_block(&self) -> Option<BlockId>;
    fn current_function(&self) -> Option<FunctionId>;
    fn block_terminated(&self, bb: BlockId) -> bool;

    /// True when there is no insertion point or it already ends in a terminator.
    fn current_block_terminated(&self) -> bool {
        self.current_block().map_or(true, |bb| self.block_terminated(bb))
    }

    // -- Constants --

    fn const_int(&mut self, ty: TypeId, value: i64) -> ValueId;
    fn const_float(&mut self, ty: TypeId, value: f64) -> ValueId;
    fn const_null(&mut self, ty: TypeId) -> ValueId;
    /// All-zero value of any type.
    fn const_zero(&mut self, ty: TypeId) -> ValueId;
    fn const_struct(&mut self, ty: TypeId, fields: &[ValueId]) -> ValueId;
    fn is_constant(&self, value: ValueId) -> bool;
    /// Integer payload of a constant, if it is one.
    fn const_int_value(&self, value: ValueId) -> Option<i64>;

    // -- Globals --

    /// Module-level variable of type `ty`; the returned value is its address.
    fn add_global(&mut self, name: &str, ty: TypeId) -> ValueId;
    fn set_global_initializer(&mut self, global: ValueId, init: ValueId) -> bool;
    fn is_global(&self, value: ValueId) -> bool;
    /// NUL-terminated string constant; the returned value is an `i8*`.
    fn global_string(&mut self, text: &str) -> ValueId;

    // -- Instructions --

    fn binary(&mut self, op: BinOp, lhs: ValueId, rhs: ValueId) -> ValueId;
    fn icmp(&mut self, pred: IntPredicate, lhs: ValueId, rhs: ValueId) -> ValueId;
    fn fcmp(&mut self, pred: FloatPredicate, lhs: ValueId, rhs: ValueId) -> ValueId;
    fn cast(&mut self, op: CastOp, value: ValueId, to: TypeId) -> ValueId;
    fn alloca(&mut self, ty: TypeId, name: &str) -> ValueId;
    fn load(&mut self, ptr: ValueId) -> ValueId;
    fn store(&mut self, value: ValueId, ptr: ValueId);
    fn struct_gep(&mut self, ptr: ValueId, index: u32) -> ValueId;
    /// Element address `ptr + index`.
    fn gep(&mut self, ptr: ValueId, index: ValueId) -> ValueId;
    fn extract_value(&mut self, aggregate: ValueId, index: u32) -> ValueId;
    fn phi(&mut self, ty: TypeId, incoming: &[(ValueId, BlockId)]) -> ValueId;
    /// Direct call. `None` for void callees.
    fn call(&mut self, f: FunctionId, args: &[ValueId]) -> Option<ValueId>;
    fn inline_asm(&mut self, text: &str);

    // -- Exceptions --

    /// Call that unwinds to `unwind` instead of propagating. Terminates the
    /// current block; the result is defined in `normal`.
    fn invoke(
        &mut self,
        f: FunctionId,
        args: &[ValueId],
        normal: BlockId,
        unwind: BlockId,
    ) -> Option<ValueId>;
    /// `{ i8*, i32 }` landing pad catching the listed descriptors.
    fn landing_pad(&mut self, clauses: &[ValueId], catch_all: bool) -> ValueId;
    /// Selector value (`i32`) for a throwable descriptor.
    fn eh_typeid_for(&mut self, descriptor: ValueId) -> ValueId;
    fn resume(&mut self, value: ValueId);

    // -- Terminators --

    fn br(&mut self, dest: BlockId);
    fn cond_br(&mut self, cond: ValueId, then_bb: BlockId, else_bb: BlockId);
    fn ret(&mut self, value: Option<ValueId>);
    fn unreachable(&mut self);
}
