//! The fixed C runtime the lowered code calls.
//!
//! Functions are declared on first use, so a module only mentions the
//! runtime entry points it needs.

use kes_emit::{CodeEmitter, FunctionId, TypeId};
use rustc_hash::FxHashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RuntimeFn {
    /// `char* calloc(long, long)`
    Calloc,
    /// `void free(char*)`
    Free,
    /// `int printf(char*, ...)`
    Printf,
    /// `double pow(double, double)`
    Pow,
    /// `void abort()`
    Abort,
    /// `char* __cxa_allocate_exception(long)`
    AllocateException,
    /// `void __cxa_throw(char* payload, char* descriptor, char* dtor)`
    Throw,
    /// `char* __cxa_begin_catch(char*)`
    BeginCatch,
    /// `void __cxa_end_catch()`
    EndCatch,
    /// `int __gxx_personality_v0(...)`
    Personality,
}

impl RuntimeFn {
    pub fn symbol(self) -> &'static str {
        match self {
            RuntimeFn::Calloc => "calloc",
            RuntimeFn::Free => "free",
            RuntimeFn::Printf => "printf",
            RuntimeFn::Pow => "pow",
            RuntimeFn::Abort => "abort",
            RuntimeFn::AllocateException => "__cxa_allocate_exception",
            RuntimeFn::Throw => "__cxa_throw",
            RuntimeFn::BeginCatch => "__cxa_begin_catch",
            RuntimeFn::EndCatch => "__cxa_end_catch",
            RuntimeFn::Personality => "__gxx_personality_v0",
        }
    }

    /// Only `__cxa_throw` unwinds into the caller.
    pub fn may_unwind(self) -> bool {
        matches!(self, RuntimeFn::Throw)
    }

    fn signature(self, emitter: &mut dyn CodeEmitter) -> TypeId {
        let i8t = emitter.int_type(8);
        let i8p = emitter.pointer_type(i8t);
        let i32t = emitter.int_type(32);
        let i64t = emitter.int_type(64);
        let f64t = emitter.float_type(64);
        let void = emitter.void_type();
        match self {
            RuntimeFn::Calloc => emitter.function_type(&[i64t, i64t], i8p, false),
            RuntimeFn::Free => emitter.function_type(&[i8p], void, false),
            RuntimeFn::Printf => emitter.function_type(&[i8p], i32t, true),
            RuntimeFn::Pow => emitter.function_type(&[f64t, f64t], f64t, false),
            RuntimeFn::Abort | RuntimeFn::EndCatch => emitter.function_type(&[], void, false),
            RuntimeFn::AllocateException => emitter.function_type(&[i64t], i8p, false),
            RuntimeFn::Throw => emitter.function_type(&[i8p, i8p, i8p], void, false),
            RuntimeFn::BeginCatch => emitter.function_type(&[i8p], i8p, false),
            RuntimeFn::Personality => emitter.function_type(&[], i32t, true),
        }
    }
}

/// Declared runtime functions of the current module.
#[derive(Debug, Default)]
pub struct RuntimeDecls {
    declared: FxHashMap<RuntimeFn, FunctionId>,
}

impl RuntimeDecls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `f` if needed and return it.
    pub fn get(&mut self, emitter: &mut dyn CodeEmitter, f: RuntimeFn) -> FunctionId {
        if let Some(&id) = self.declared.get(&f) {
            return id;
        }
        let ty = f.signature(emitter);
        let id = emitter.declare_function(f.symbol(), ty);
        tracing::trace!(name = f.symbol(), "runtime function declared");
        self.declared.insert(f, id);
        id
    }

    /// Whether `function` is one of the runtime functions, and which.
    pub fn identify(&self, function: FunctionId) -> Option<RuntimeFn> {
        self.declared
            .iter()
            .find_map(|(&f, &id)| (id == function).then_some(f))
    }
}

#[cfg(test)]
mod tests {
    use kes_emit::IrModule;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn declarations_are_created_once() {
        let mut m = IrModule::new("t");
        let mut rt = RuntimeDecls::new();
        let a = rt.get(&mut m, RuntimeFn::Calloc);
        let b = rt.get(&mut m, RuntimeFn::Calloc);
        assert_eq!(a, b);
        assert_eq!(m.function_name(a), "calloc");
        assert_eq!(rt.identify(a), Some(RuntimeFn::Calloc));
    }

    #[test]
    fn printf_is_variadic() {
        let mut m = IrModule::new("t");
        let mut rt = RuntimeDecls::new();
        let printf = rt.get(&mut m, RuntimeFn::Printf);
        let sig = m.function_sig(m.function_type_of(printf));
        assert_eq!(sig.map(|s| s.variadic), Some(true));
        assert!(RuntimeFn::Throw.may_unwind());
        assert!(!RuntimeFn::Printf.may_unwind());
    }
}
