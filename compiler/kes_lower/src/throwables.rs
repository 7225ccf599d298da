//! Runtime descriptors for thrown types.
//!
//! Each type that is thrown or caught gets one global
//! `{ long token, char* name }`, created on first use and reused after.
//! The descriptor's address identifies the type at run time: landing pads
//! list descriptors as clauses and `eh_typeid_for` maps one to a selector.

use kes_emit::{CodeEmitter, FunctionId, TypeId, ValueId};
use rustc_hash::FxHashMap;

#[derive(Debug, Default)]
pub struct ThrowableRegistry {
    descriptors: FxHashMap<TypeId, ValueId>,
    /// `void dtor(char*)` wrappers around registered `delete` operators.
    destructors: FxHashMap<TypeId, FunctionId>,
}

impl ThrowableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The descriptor global for `ty`, named `label` in messages.
    pub fn descriptor(&mut self, emitter: &mut dyn CodeEmitter, ty: TypeId, label: &str) -> ValueId {
        if let Some(&d) = self.descriptors.get(&ty) {
            return d;
        }
        let i8t = emitter.int_type(8);
        let i8p = emitter.pointer_type(i8t);
        let i64t = emitter.int_type(64);
        let desc_ty = emitter.literal_struct(&[i64t, i8p]);
        let global = emitter.add_global(&format!("__kes_typeinfo.{label}"), desc_ty);
        let token = i64::try_from(self.descriptors.len() + 1).unwrap_or(i64::MAX);
        let token = emitter.const_int(i64t, token);
        let text = emitter.global_string(label);
        let init = emitter.const_struct(desc_ty, &[token, text]);
        emitter.set_global_initializer(global, init);
        tracing::debug!(ty = label, "throwable descriptor created");
        self.descriptors.insert(ty, global);
        global
    }

    pub fn destructor(&self, ty: TypeId) -> Option<FunctionId> {
        self.destructors.get(&ty).copied()
    }

    pub fn set_destructor(&mut self, ty: TypeId, f: FunctionId) {
        self.destructors.insert(ty, f);
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
