//! Operator overload registry.
//!
//! Keyed by `(lhs type or none, symbol, rhs type or none)`. A missing side
//! means the operator does not take that operand: prefix unary operators
//! have no lhs, `delete` has no rhs. Two symbols use the rhs slot for
//! something other than an operand:
//!
//! - `as`: rhs is the target type of the cast.
//! - `[]`: rhs is the index type.
//!
//! Every operator lowering asks this registry first and only falls back to
//! built-in semantics when nothing matches.

use kes_emit::{FunctionId, TypeId};
use kes_ir::OpSymbol;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::symbols::{match_tier, pick, ParamSig, Resolution, ThrowSet, TypeRelation};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OperatorKey {
    pub lhs: Option<TypeId>,
    pub symbol: OpSymbol,
    pub rhs: Option<TypeId>,
}

impl OperatorKey {
    pub fn binary(lhs: TypeId, symbol: OpSymbol, rhs: TypeId) -> Self {
        OperatorKey {
            lhs: Some(lhs),
            symbol,
            rhs: Some(rhs),
        }
    }

    pub fn prefix(symbol: OpSymbol, operand: TypeId) -> Self {
        OperatorKey {
            lhs: None,
            symbol,
            rhs: Some(operand),
        }
    }

    pub fn postfix(operand: TypeId, symbol: OpSymbol) -> Self {
        OperatorKey {
            lhs: Some(operand),
            symbol,
            rhs: None,
        }
    }

    fn sides(&self) -> SmallVec<[TypeId; 2]> {
        self.lhs.into_iter().chain(self.rhs).collect()
    }
}

/// A user-defined or synthesized operator implementation.
#[derive(Clone, Debug, PartialEq)]
pub struct OperatorEntry {
    pub function: FunctionId,
    /// Parameters of the lowered function, in call order.
    pub params: Vec<ParamSig>,
    pub ret: TypeId,
    pub ret_ref: bool,
    pub throws: ThrowSet,
}

/// All registered operators.
#[derive(Debug, Default)]
pub struct OperatorRegistry {
    entries: Vec<(OperatorKey, OperatorEntry)>,
    exact: FxHashMap<OperatorKey, usize>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operator. An existing entry under the same key is kept
    /// and the new one handed back.
    pub fn insert(&mut self, key: OperatorKey, entry: OperatorEntry) -> Result<usize, OperatorEntry> {
        if self.exact.contains_key(&key) {
            return Err(entry);
        }
        let index = self.entries.len();
        self.entries.push((key, entry));
        self.exact.insert(key, index);
        tracing::debug!(symbol = %key.symbol, index, "operator registered");
        Ok(index)
    }

    /// Find the operator for `key`: the exact key first, then the same
    /// tiered matching function overloads use, applied to each side.
    pub fn lookup(&self, rel: &dyn TypeRelation, key: OperatorKey) -> Resolution {
        if let Some(&index) = self.exact.get(&key) {
            return Resolution::Found(index);
        }
        let args = key.sides();
        pick(self.entries.iter().map(|(k, _)| {
            let shape_matches = k.symbol == key.symbol
                && k.lhs.is_some() == key.lhs.is_some()
                && k.rhs.is_some() == key.rhs.is_some();
            if !shape_matches {
                return None;
            }
            let params: SmallVec<[ParamSig; 2]> = k.sides().into_iter().map(ParamSig::value).collect();
            match_tier(rel, &args, &params)
        }))
    }

    /// Whether any operator is registered for exactly `key`.
    pub fn contains(&self, key: &OperatorKey) -> bool {
        self.exact.contains_key(key)
    }

    pub fn get(&self, index: usize) -> Option<&OperatorEntry> {
        self.entries.get(index).map(|(_, e)| e)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut OperatorEntry> {
        self.entries.get_mut(index).map(|(_, e)| e)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use kes_ir::{BinaryOp, UnaryOp};
    use pretty_assertions::assert_eq;

    use super::*;

    struct OnePointer;

    impl TypeRelation for OnePointer {
        fn pointee(&self, ty: TypeId) -> Option<TypeId> {
            // 10 is a pointer to 1.
            (ty.raw() == 10).then(|| TypeId::from_raw(1))
        }
    }

    fn entry(f: u32) -> OperatorEntry {
        OperatorEntry {
            function: FunctionId::from_raw(f),
            params: Vec::new(),
            ret: TypeId::from_raw(0),
            ret_ref: false,
            throws: ThrowSet::new(),
        }
    }

    fn t(raw: u32) -> TypeId {
        TypeId::from_raw(raw)
    }

    #[test]
    fn exact_key_is_found_and_duplicates_rejected() {
        let mut ops = OperatorRegistry::new();
        let add = OpSymbol::Binary(BinaryOp::Add);
        let key = OperatorKey::binary(t(1), add, t(1));
        assert_eq!(ops.insert(key, entry(0)), Ok(0));
        assert!(ops.insert(key, entry(1)).is_err());
        assert_eq!(ops.lookup(&OnePointer, key), Resolution::Found(0));
        assert_eq!(
            ops.lookup(&OnePointer, OperatorKey::binary(t(1), add, t(2))),
            Resolution::NotFound
        );
    }

    #[test]
    fn pointer_operands_reach_value_operators() {
        let mut ops = OperatorRegistry::new();
        let add = OpSymbol::Binary(BinaryOp::Add);
        ops.insert(OperatorKey::binary(t(1), add, t(1)), entry(0)).unwrap();
        assert_eq!(
            ops.lookup(&OnePointer, OperatorKey::binary(t(10), add, t(1))),
            Resolution::Found(0)
        );
    }

    #[test]
    fn arity_and_symbol_must_agree() {
        let mut ops = OperatorRegistry::new();
        let neg = OpSymbol::Unary(UnaryOp::Neg);
        ops.insert(OperatorKey::prefix(neg, t(1)), entry(0)).unwrap();
        ops.insert(OperatorKey::postfix(t(1), OpSymbol::Delete), entry(1)).unwrap();
        assert_eq!(
            ops.lookup(&OnePointer, OperatorKey::postfix(t(1), neg)),
            Resolution::NotFound
        );
        assert_eq!(
            ops.lookup(&OnePointer, OperatorKey::postfix(t(10), OpSymbol::Delete)),
            Resolution::Found(1)
        );
        assert!(ops.contains(&OperatorKey::prefix(neg, t(1))));
        assert_eq!(ops.len(), 2);
    }
}
