//! Alias manager: the variable, function and object tables.
//!
//! All three tables are flat and grow monotonically while one translation
//! unit (plus its imports) is lowered. The exceptions are variable
//! bindings, which are snapshotted on function entry and restored on exit,
//! and template placeholder objects, which are removed right after the
//! instantiation that bound them.

mod overload;

use kes_emit::{TypeId, ValueId};
use kes_ir::Name;
use rustc_hash::FxHashMap;

pub use overload::{
    aliases, merge_throws, Overload, OverloadSet, ParamSig, Resolution, ThrowSet, TypeRelation,
};
pub(crate) use overload::{match_tier, pick};

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

/// Where a named value lives.
///
/// `storage` always points at the value: an `alloca`, a global, or for
/// references (`T&` parameters, catch bindings) the referent itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VarBinding {
    pub storage: ValueId,
    pub value_ty: TypeId,
    pub is_reference: bool,
}

/// Variable map saved on function entry.
#[derive(Debug)]
pub struct SavedVariables(FxHashMap<Name, VarBinding>);

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// Result of a member lookup. `index == -1` means not found.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemberSlot {
    pub ty: TypeId,
    pub index: i32,
}

impl MemberSlot {
    pub const NOT_FOUND: MemberSlot = MemberSlot {
        ty: TypeId::NONE,
        index: -1,
    };

    pub fn is_found(self) -> bool {
        self.index >= 0
    }
}

/// One object type (declared, instantiated, or a placeholder binding).
#[derive(Clone, Debug)]
pub struct ObjectDesc {
    pub name: Name,
    pub ty: TypeId,
    pub members: Vec<(Name, TypeId)>,
    pub methods: FxHashMap<Name, OverloadSet>,
    pub constructors: OverloadSet,
    /// Members are known and the backend struct has a body.
    pub complete: bool,
    /// A template parameter bound to a concrete type.
    pub placeholder: bool,
}

impl ObjectDesc {
    /// Fresh, incomplete object.
    pub fn new(name: Name, ty: TypeId) -> Self {
        ObjectDesc {
            name,
            ty,
            members: Vec::new(),
            methods: FxHashMap::default(),
            constructors: OverloadSet::new(),
            complete: false,
            placeholder: false,
        }
    }

    pub fn member(&self, name: Name) -> MemberSlot {
        self.members
            .iter()
            .position(|(n, _)| *n == name)
            .and_then(|i| self.member_at(i))
            .unwrap_or(MemberSlot::NOT_FOUND)
    }

    pub fn member_at(&self, index: usize) -> Option<MemberSlot> {
        let (_, ty) = self.members.get(index)?;
        Some(MemberSlot {
            ty: *ty,
            index: i32::try_from(index).ok()?,
        })
    }
}

/// An object entry hidden by a placeholder binding, restored on unbind.
#[derive(Debug)]
pub struct Shadowed(Option<ObjectDesc>);

// ---------------------------------------------------------------------------
// SymbolTable
// ---------------------------------------------------------------------------

/// The three coupled name tables.
#[derive(Debug, Default)]
pub struct SymbolTable {
    variables: FxHashMap<Name, VarBinding>,
    functions: FxHashMap<Name, OverloadSet>,
    objects: FxHashMap<Name, ObjectDesc>,
    by_type: FxHashMap<TypeId, Name>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Variables --

    pub fn variable(&self, name: Name) -> Option<&VarBinding> {
        self.variables.get(&name)
    }

    /// Read-modify-write handle to a binding.
    pub fn variable_mut(&mut self, name: Name) -> Option<&mut VarBinding> {
        self.variables.get_mut(&name)
    }

    /// Bind `name`, returning the binding it replaces.
    pub fn set_variable(&mut self, name: Name, binding: VarBinding) -> Option<VarBinding> {
        self.variables.insert(name, binding)
    }

    pub fn remove_variable(&mut self, name: Name) -> Option<VarBinding> {
        self.variables.remove(&name)
    }

    /// Save the variable map and keep only the bindings `keep` accepts
    /// (module globals). Pair with [`SymbolTable::exit_function`].
    pub fn enter_function(&mut self, keep: impl Fn(&VarBinding) -> bool) -> SavedVariables {
        let saved = self.variables.clone();
        self.variables.retain(|_, b| keep(b));
        SavedVariables(saved)
    }

    pub fn exit_function(&mut self, saved: SavedVariables) {
        self.variables = saved.0;
    }

    // -- Functions --

    pub fn functions(&self, name: Name) -> Option<&OverloadSet> {
        self.functions.get(&name)
    }

    pub fn functions_mut(&mut self, name: Name) -> Option<&mut OverloadSet> {
        self.functions.get_mut(&name)
    }

    /// Add a free-function overload. An identical parameter list is
    /// rejected and handed back.
    pub fn declare_function(&mut self, name: Name, overload: Overload) -> Result<usize, Overload> {
        self.functions.entry(name).or_default().insert(overload)
    }

    // -- Objects --

    pub fn object(&self, name: Name) -> Option<&ObjectDesc> {
        self.objects.get(&name)
    }

    pub fn object_mut(&mut self, name: Name) -> Option<&mut ObjectDesc> {
        self.objects.get_mut(&name)
    }

    /// Reverse lookup from a backend struct type.
    pub fn object_by_type(&self, ty: TypeId) -> Option<&ObjectDesc> {
        self.by_type.get(&ty).and_then(|n| self.objects.get(n))
    }

    pub fn object_by_type_mut(&mut self, ty: TypeId) -> Option<&mut ObjectDesc> {
        let name = *self.by_type.get(&ty)?;
        self.objects.get_mut(&name)
    }

    /// Insert or replace an object entry and index its type.
    pub fn declare_object(&mut self, desc: ObjectDesc) {
        if !desc.placeholder {
            self.by_type.insert(desc.ty, desc.name);
        }
        self.objects.insert(desc.name, desc);
    }

    pub fn member(&self, object_ty: TypeId, member: Name) -> MemberSlot {
        self.object_by_type(object_ty)
            .map_or(MemberSlot::NOT_FOUND, |o| o.member(member))
    }

    pub fn member_at(&self, object_ty: TypeId, index: usize) -> MemberSlot {
        self.object_by_type(object_ty)
            .and_then(|o| o.member_at(index))
            .unwrap_or(MemberSlot::NOT_FOUND)
    }

    /// Constructor overloads of an object type.
    pub fn constructors(&self, object_ty: TypeId) -> Option<&OverloadSet> {
        self.object_by_type(object_ty).map(|o| &o.constructors)
    }

    // -- Template placeholders --

    /// Make `name` resolve to `ty` until [`SymbolTable::unbind_placeholder`].
    pub fn bind_placeholder(&mut self, name: Name, ty: TypeId) -> Shadowed {
        let mut desc = ObjectDesc::new(name, ty);
        desc.complete = true;
        desc.placeholder = true;
        Shadowed(self.objects.insert(name, desc))
    }

    /// Remove a placeholder binding and restore what it hid.
    pub fn unbind_placeholder(&mut self, name: Name, shadowed: Shadowed) {
        match shadowed.0 {
            Some(previous) => {
                self.objects.insert(name, previous);
            }
            None => {
                if self.objects.get(&name).is_some_and(|o| o.placeholder) {
                    self.objects.remove(&name);
                }
            }
        }
    }
}
