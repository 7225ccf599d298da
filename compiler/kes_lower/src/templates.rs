//! Template blueprints and the instantiation cache.
//!
//! A blueprint is keyed by `(name, placeholder count)`; an instance by
//! `(name, concrete argument types)`. Instantiation itself lives in the
//! lowerer, because it lowers member types and method bodies.

use std::rc::Rc;

use kes_emit::TypeId;
use kes_ir::{Ast, MemberDecl, Name, NodeId, StringInterner, TypeExpr};
use rustc_hash::FxHashMap;

/// Where an instantiation gets its members and methods from.
#[derive(Clone, Debug)]
pub enum BlueprintBody {
    /// Declared in source; methods are nodes of `ast`.
    Declared {
        ast: Rc<Ast>,
        members: Vec<MemberDecl>,
        methods: Vec<NodeId>,
    },
    /// The built-in dynamic array, synthesized per element type.
    DynArray,
}

#[derive(Clone, Debug)]
pub struct Blueprint {
    pub name: Name,
    pub params: Vec<Name>,
    pub body: BlueprintBody,
}

impl Blueprint {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Registered blueprints plus the monomorphization cache.
#[derive(Debug)]
pub struct TemplateRegistry {
    blueprints: FxHashMap<(Name, usize), Blueprint>,
    instances: FxHashMap<(Name, Vec<TypeId>), TypeId>,
    array_name: Name,
}

impl TemplateRegistry {
    /// Registry holding only the built-in `Array<T>` blueprint.
    pub fn new(interner: &StringInterner) -> Self {
        let array_name = interner.intern(TypeExpr::ARRAY_NAME);
        let mut blueprints = FxHashMap::default();
        blueprints.insert(
            (array_name, 1),
            Blueprint {
                name: array_name,
                params: vec![interner.intern("T")],
                body: BlueprintBody::DynArray,
            },
        );
        TemplateRegistry {
            blueprints,
            instances: FxHashMap::default(),
            array_name,
        }
    }

    pub fn array_name(&self) -> Name {
        self.array_name
    }

    /// Register a blueprint. Redeclaring the same name and placeholder
    /// count is rejected and the blueprint handed back.
    pub fn insert(&mut self, blueprint: Blueprint) -> Result<(), Blueprint> {
        let key = (blueprint.name, blueprint.arity());
        if self.blueprints.contains_key(&key) {
            return Err(blueprint);
        }
        self.blueprints.insert(key, blueprint);
        Ok(())
    }

    pub fn get(&self, name: Name, arity: usize) -> Option<&Blueprint> {
        self.blueprints.get(&(name, arity))
    }

    /// Whether any blueprint of this name exists, whatever its arity.
    pub fn has_name(&self, name: Name) -> bool {
        self.blueprints.keys().any(|(n, _)| *n == name)
    }

    pub fn instance(&self, name: Name, args: &[TypeId]) -> Option<TypeId> {
        self.instances.get(&(name, args.to_vec())).copied()
    }

    pub fn record_instance(&mut self, name: Name, args: Vec<TypeId>, ty: TypeId) {
        self.instances.insert((name, args), ty);
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn declared(interner: &StringInterner, name: &str, params: &[&str]) -> Blueprint {
        Blueprint {
            name: interner.intern(name),
            params: params.iter().map(|p| interner.intern(p)).collect(),
            body: BlueprintBody::Declared {
                ast: Rc::new(Ast::new()),
                members: Vec::new(),
                methods: Vec::new(),
            },
        }
    }

    #[test]
    fn array_blueprint_is_preregistered() {
        let interner = StringInterner::new();
        let templates = TemplateRegistry::new(&interner);
        let array = templates.get(interner.intern("Array"), 1);
        assert!(matches!(array.map(|b| &b.body), Some(BlueprintBody::DynArray)));
        assert!(templates.has_name(templates.array_name()));
    }

    #[test]
    fn redeclaration_is_keyed_by_name_and_arity() {
        let interner = StringInterner::new();
        let mut templates = TemplateRegistry::new(&interner);
        assert!(templates.insert(declared(&interner, "Pair", &["A", "B"])).is_ok());
        assert!(templates.insert(declared(&interner, "Pair", &["A"])).is_ok());
        assert!(templates.insert(declared(&interner, "Pair", &["X", "Y"])).is_err());
        assert!(templates.insert(declared(&interner, "Array", &["U"])).is_err());
    }

    #[test]
    fn instances_are_keyed_by_argument_list() {
        let interner = StringInterner::new();
        let mut templates = TemplateRegistry::new(&interner);
        let list = interner.intern("List");
        let int = TypeId::from_raw(1);
        let long = TypeId::from_raw(2);
        templates.record_instance(list, vec![int], TypeId::from_raw(10));
        assert_eq!(templates.instance(list, &[int]), Some(TypeId::from_raw(10)));
        assert_eq!(templates.instance(list, &[long]), None);
        assert_eq!(templates.instance_count(), 1);
    }
}
