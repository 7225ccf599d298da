//! `IrModule`: an in-memory, recording implementation of [`CodeEmitter`].
//!
//! Every value, block and function lives in a table behind an ID. Basic
//! blocks hold the ordered list of instruction values they contain plus an
//! optional terminator, mirroring the shape of LLVM IR closely enough that
//! the printed form reads like it.
//!
//! Constant operands are folded at emission time, so module-scope
//! initializers such as `2 + 3` stay constants without any insertion
//! point. Instructions requested with no insertion point, or after the
//! block terminator, are kept in a detached list and counted as codegen
//! errors.
//!
//! [`CodeEmitter`]: crate::CodeEmitter

mod builder;
mod fold;
mod print;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::ids::to_u32;
use crate::ops::{BinOp, CastOp, FloatPredicate, IntPredicate};
use crate::types::TypeTable;
use crate::{BlockId, FunctionId, TypeId, ValueId};

/// A compile-time constant.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    /// Integer of the value's width, sign-extended (`i1` is 0 or 1).
    Int(i64),
    Float(f64),
    Null,
    /// All-zero aggregate.
    Zero,
    Struct(Vec<ValueId>),
    /// Byte array initializer (string literals).
    Bytes(Vec<u8>),
}

/// A non-terminator instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Instr {
    Binary {
        op: BinOp,
        lhs: ValueId,
        rhs: ValueId,
    },
    ICmp {
        pred: IntPredicate,
        lhs: ValueId,
        rhs: ValueId,
    },
    FCmp {
        pred: FloatPredicate,
        lhs: ValueId,
        rhs: ValueId,
    },
    Cast {
        op: CastOp,
        value: ValueId,
    },
    Alloca {
        ty: TypeId,
    },
    Load {
        ptr: ValueId,
    },
    Store {
        value: ValueId,
        ptr: ValueId,
    },
    StructGep {
        ptr: ValueId,
        index: u32,
    },
    Gep {
        ptr: ValueId,
        index: ValueId,
    },
    ExtractValue {
        aggregate: ValueId,
        index: u32,
    },
    Phi {
        incoming: SmallVec<[(ValueId, BlockId); 4]>,
    },
    Call {
        function: FunctionId,
        args: Vec<ValueId>,
    },
    LandingPad {
        clauses: Vec<ValueId>,
        catch_all: bool,
    },
    TypeIdFor {
        descriptor: ValueId,
    },
    InlineAsm {
        text: String,
    },
}

/// Block terminator.
#[derive(Clone, Debug, PartialEq)]
pub enum Terminator {
    Br(BlockId),
    CondBr {
        cond: ValueId,
        then_bb: BlockId,
        else_bb: BlockId,
    },
    Ret(Option<ValueId>),
    Invoke {
        function: FunctionId,
        args: Vec<ValueId>,
        normal: BlockId,
        unwind: BlockId,
        /// Defined on the normal edge; `None` for void callees.
        result: Option<ValueId>,
    },
    Resume(ValueId),
    Unreachable,
}

impl Terminator {
    /// Successor blocks.
    pub fn successors(&self) -> SmallVec<[BlockId; 2]> {
        match self {
            Terminator::Br(bb) => smallvec::smallvec![*bb],
            Terminator::CondBr {
                then_bb, else_bb, ..
            } => smallvec::smallvec![*then_bb, *else_bb],
            Terminator::Invoke { normal, unwind, .. } => smallvec::smallvec![*normal, *unwind],
            Terminator::Ret(_) | Terminator::Resume(_) | Terminator::Unreachable => SmallVec::new(),
        }
    }
}

/// How a value is defined.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueDef {
    Const(Constant),
    Param { function: FunctionId, index: u32 },
    /// Address of the global at this index.
    Global(u32),
    /// Address of a function.
    Function(FunctionId),
    Instr(Instr),
    /// Result of an `invoke` terminator.
    InvokeResult,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValueData {
    pub ty: TypeId,
    pub def: ValueDef,
}

/// A module-level variable.
#[derive(Clone, Debug, PartialEq)]
pub struct Global {
    pub name: String,
    /// Type of the stored value (the global's address is a pointer to it).
    pub value_ty: TypeId,
    pub init: Option<ValueId>,
}

#[derive(Clone, Debug)]
pub struct FunctionData {
    pub name: String,
    pub ty: TypeId,
    pub params: Vec<ValueId>,
    pub blocks: Vec<BlockId>,
    pub personality: Option<FunctionId>,
    ptr: Option<ValueId>,
}

impl FunctionData {
    /// A declaration has no body.
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn entry(&self) -> Option<BlockId> {
        self.blocks.first().copied()
    }
}

#[derive(Clone, Debug)]
pub struct BlockData {
    pub name: String,
    pub function: FunctionId,
    pub instrs: Vec<ValueId>,
    pub terminator: Option<Terminator>,
}

/// In-memory IR module.
#[derive(Clone, Debug, Default)]
pub struct IrModule {
    name: String,
    types: TypeTable,
    values: Vec<ValueData>,
    functions: Vec<FunctionData>,
    function_index: FxHashMap<String, FunctionId>,
    blocks: Vec<BlockData>,
    globals: Vec<Global>,
    position: Option<BlockId>,
    detached: Vec<ValueId>,
    codegen_errors: u32,
    string_count: u32,
}

impl IrModule {
    pub fn new(name: impl Into<String>) -> Self {
        IrModule {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.index()]
    }

    pub fn function(&self, id: FunctionId) -> &FunctionData {
        &self.functions[id.index()]
    }

    /// All functions in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &FunctionData)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FunctionId::from_raw(to_u32(i)), f))
    }

    pub fn function_by_name(&self, name: &str) -> Option<FunctionId> {
        self.function_index.get(name).copied()
    }

    pub fn block(&self, id: BlockId) -> &BlockData {
        &self.blocks[id.index()]
    }

    pub fn globals(&self) -> &[Global] {
        &self.globals
    }

    pub fn global(&self, index: u32) -> &Global {
        &self.globals[index as usize]
    }

    /// Instructions emitted with no valid insertion point.
    pub fn detached(&self) -> &[ValueId] {
        &self.detached
    }

    /// Number of malformed requests seen while building.
    ///
    /// If > 0 the module must not be executed.
    pub fn codegen_error_count(&self) -> u32 {
        self.codegen_errors
    }

    /// Total instructions placed in blocks.
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.instrs.len()).sum()
    }

    pub(crate) fn record_codegen_error(&mut self) {
        self.codegen_errors += 1;
    }

    pub(crate) fn push_value(&mut self, ty: TypeId, def: ValueDef) -> ValueId {
        let id = ValueId::from_raw(to_u32(self.values.len()));
        self.values.push(ValueData { ty, def });
        id
    }

    /// The constant behind `id`, if any.
    pub fn constant(&self, id: ValueId) -> Option<&Constant> {
        match &self.value(id).def {
            ValueDef::Const(c) => Some(c),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests;
