//! The interpreter.
//!
//! Calls recurse on the Rust stack (grown on demand with `stacker`) and
//! return `Result<Val, Unwind>`: a thrown exception travels as
//! [`Unwind::Throw`] until an `invoke` whose landing pad catches it, the
//! way a personality routine would decide.

mod exec;
mod runtime;

use kes_emit::{Constant, FunctionId, IrModule, TypeId, TypeKind, ValueDef, ValueId};
use rustc_hash::FxHashMap;

use crate::memory::Memory;
use crate::value::{Val, FUNC_BASE};
use crate::{ExecError, MachineConfig};

/// Minimum stack space to keep available before recursing into a call.
const RED_ZONE: usize = 128 * 1024;
/// Stack space to allocate when growing.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Result of running a program to completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    /// Everything written through `printf`.
    pub stdout: String,
    /// Return value of the entry point (0 for `void`).
    pub exit_code: i64,
}

/// An exception in flight or being handled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Exception {
    pub payload: u64,
    pub descriptor: u64,
    pub destructor: u64,
}

/// Non-local exit from a call.
#[derive(Debug)]
pub(crate) enum Unwind {
    Throw(Exception),
    Error(ExecError),
}

impl From<ExecError> for Unwind {
    fn from(e: ExecError) -> Self {
        Unwind::Error(e)
    }
}

/// Per-call value bindings.
#[derive(Default)]
pub(crate) struct Frame {
    values: FxHashMap<ValueId, Val>,
    /// Exception delivered to the landing pad this frame is about to run.
    in_flight: Option<Exception>,
}

/// Executes an [`IrModule`].
pub struct Machine<'m> {
    module: &'m IrModule,
    config: MachineConfig,
    memory: Memory,
    globals: Vec<u64>,
    typeids: FxHashMap<u64, i64>,
    stdout: String,
    steps: u64,
    depth: usize,
    /// Thrown and not yet caught, keyed by payload address.
    thrown: FxHashMap<u64, Exception>,
    /// Caught by `__cxa_begin_catch`, innermost last.
    caught: Vec<Exception>,
}

impl<'m> Machine<'m> {
    /// Lay out globals and write their initializers.
    pub fn new(module: &'m IrModule, config: MachineConfig) -> Result<Self, ExecError> {
        let errors = module.codegen_error_count();
        if errors > 0 {
            return Err(ExecError::MalformedModule(errors));
        }
        let types = module.types();
        let mut memory = Memory::new(config.memory_limit);
        let mut globals = Vec::with_capacity(module.globals().len());
        for g in module.globals() {
            globals.push(memory.alloc_heap(types.size_of(g.value_ty), types.align_of(g.value_ty))?);
        }
        let mut machine = Machine {
            module,
            config,
            memory,
            globals,
            typeids: FxHashMap::default(),
            stdout: String::new(),
            steps: 0,
            depth: 0,
            thrown: FxHashMap::default(),
            caught: Vec::new(),
        };
        for (i, g) in module.globals().iter().enumerate() {
            if let Some(init) = g.init {
                machine.write_const(machine.globals[i], g.value_ty, init)?;
            }
        }
        Ok(machine)
    }

    /// Run `entry` with no arguments.
    #[tracing::instrument(skip(self), fields(module = self.module.name()))]
    pub fn run(&mut self, entry: &str) -> Result<Outcome, ExecError> {
        let value = self.call(entry, Vec::new())?;
        Ok(Outcome {
            stdout: std::mem::take(&mut self.stdout),
            exit_code: value.as_int().unwrap_or(0),
        })
    }

    /// Call a function by name.
    pub fn call(&mut self, name: &str, args: Vec<Val>) -> Result<Val, ExecError> {
        let f = self
            .module
            .function_by_name(name)
            .ok_or_else(|| ExecError::NoSuchFunction(name.to_owned()))?;
        match self.call_function(f, args) {
            Ok(v) => Ok(v),
            Err(Unwind::Error(e)) => Err(e),
            Err(Unwind::Throw(exc)) => Err(ExecError::UncaughtException {
                type_name: self.descriptor_name(exc.descriptor),
            }),
        }
    }

    /// Output written so far and not yet returned by [`Machine::run`].
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Heap allocations not yet freed.
    pub fn live_allocations(&self) -> u64 {
        self.memory.live_allocations
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub(crate) fn call_function(&mut self, f: FunctionId, args: Vec<Val>) -> Result<Val, Unwind> {
        if self.depth >= self.config.max_call_depth {
            return Err(ExecError::CallDepth(self.config.max_call_depth).into());
        }
        let func = self.module.function(f);
        if func.is_declaration() {
            let name = func.name.clone();
            return runtime::call_extern(self, &name, &args);
        }
        self.depth += 1;
        let mark = self.memory.stack_mark();
        let result = stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, || self.exec_body(f, args));
        self.memory.reset_stack(mark);
        self.depth -= 1;
        result
    }

    fn step(&mut self) -> Result<(), ExecError> {
        self.steps += 1;
        if self.steps > self.config.max_steps {
            return Err(ExecError::StepLimit(self.config.max_steps));
        }
        Ok(())
    }

    /// Selector for a descriptor address, assigned in first-seen order.
    fn typeid_for(&mut self, descriptor: u64) -> i64 {
        let next = self.typeids.len() as i64 + 1;
        *self.typeids.entry(descriptor).or_insert(next)
    }

    /// Human-readable type name stored in a throwable descriptor.
    fn descriptor_name(&self, descriptor: u64) -> String {
        self.memory
            .read_bytes(descriptor + kes_emit::POINTER_SIZE, kes_emit::POINTER_SIZE)
            .ok()
            .and_then(|b| <[u8; 8]>::try_from(b.as_slice()).ok())
            .map(u64::from_le_bytes)
            .and_then(|addr| self.memory.read_c_string(addr).ok())
            .unwrap_or_else(|| format!("<descriptor {descriptor:#x}>"))
    }

    fn zero_val(&self, ty: TypeId) -> Val {
        let types = self.module.types();
        match types.kind(ty) {
            TypeKind::Int { .. } => Val::Int(0),
            TypeKind::Float { .. } => Val::Float(0.0),
            TypeKind::Pointer { .. } | TypeKind::Function => Val::Ptr(0),
            TypeKind::Struct => Val::Agg(
                types
                    .struct_fields(ty)
                    .unwrap_or(&[])
                    .iter()
                    .map(|&f| self.zero_val(f))
                    .collect(),
            ),
            TypeKind::Array { elem, len } => Val::Agg((0..len).map(|_| self.zero_val(elem)).collect()),
            TypeKind::Void => Val::Void,
        }
    }

    /// Value of a constant, global address or function address.
    fn const_val(&self, id: ValueId) -> Result<Val, ExecError> {
        let data = self.module.value(id);
        Ok(match &data.def {
            ValueDef::Const(c) => match c {
                Constant::Int(i) => Val::Int(*i),
                Constant::Float(f) => Val::Float(*f),
                Constant::Null => Val::Ptr(0),
                Constant::Zero => self.zero_val(data.ty),
                Constant::Struct(fields) => Val::Agg(
                    fields
                        .iter()
                        .map(|&f| self.const_val(f))
                        .collect::<Result<_, _>>()?,
                ),
                Constant::Bytes(bytes) => {
                    Val::Agg(bytes.iter().map(|&b| Val::Int(i64::from(b))).collect())
                }
            },
            ValueDef::Global(i) => Val::Ptr(self.globals[*i as usize]),
            ValueDef::Function(f) => Val::Ptr(FUNC_BASE | u64::from(f.raw())),
            other => {
                return Err(ExecError::MalformedIr(format!(
                    "{id:?} is not a constant: {other:?}"
                )))
            }
        })
    }

    fn write_const(&mut self, addr: u64, ty: TypeId, init: ValueId) -> Result<(), ExecError> {
        if let Some(Constant::Bytes(bytes)) = self.module.constant(init) {
            return self.memory.write_bytes(addr, bytes);
        }
        let val = self.const_val(init)?;
        self.memory.write(self.module.types(), addr, ty, &val)
    }
}

/// Decode a function address produced by `function_ptr`.
pub(crate) fn decode_function(addr: u64) -> Option<FunctionId> {
    (addr & FUNC_BASE != 0).then(|| FunctionId::from_raw((addr & !FUNC_BASE) as u32))
}
