//! Overload sets and argument matching.
//!
//! Matching is tiered and deterministic:
//!
//! 1. **Exact**: every argument type equals the parameter type.
//! 2. **Aliased**: every position is exact or related by the pointer/value
//!    aliasing rule (`T` against `T*` in either direction).
//!
//! No other conversion makes a candidate. In the best tier exactly one
//! candidate must match; two or more is [`Resolution::Ambiguous`].

use kes_emit::{FunctionId, TypeId};
use smallvec::SmallVec;

/// Exception types a function or node may propagate.
pub type ThrowSet = SmallVec<[TypeId; 2]>;

/// Add every type of `src` not already in `dst`, keeping first-seen order.
pub fn merge_throws(dst: &mut ThrowSet, src: &[TypeId]) {
    for &ty in src {
        if !dst.contains(&ty) {
            dst.push(ty);
        }
    }
}

/// The type questions matching needs answered about backend types.
pub trait TypeRelation {
    /// Pointee of a pointer type.
    fn pointee(&self, ty: TypeId) -> Option<TypeId>;
}

/// `T` and `T*` accept each other.
pub fn aliases(rel: &dyn TypeRelation, a: TypeId, b: TypeId) -> bool {
    a == b || rel.pointee(a) == Some(b) || rel.pointee(b) == Some(a)
}

/// One declared parameter, as seen by callers.
///
/// For `int& x` the type is `int` and `is_reference` is set; the lowered
/// function receives an `int*`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParamSig {
    pub ty: TypeId,
    pub is_reference: bool,
}

impl ParamSig {
    pub fn value(ty: TypeId) -> Self {
        ParamSig {
            ty,
            is_reference: false,
        }
    }

    pub fn reference(ty: TypeId) -> Self {
        ParamSig {
            ty,
            is_reference: true,
        }
    }
}

/// One callable in an overload set.
#[derive(Clone, Debug, PartialEq)]
pub struct Overload {
    /// Mangled symbol, for messages and logs.
    pub symbol: String,
    pub params: Vec<ParamSig>,
    pub ret: TypeId,
    pub ret_ref: bool,
    pub function: FunctionId,
    pub throws: ThrowSet,
}

/// Outcome of a lookup.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Found(usize),
    NotFound,
    /// Number of equally good candidates.
    Ambiguous(usize),
}

impl Resolution {
    pub fn found(self) -> Option<usize> {
        match self {
            Resolution::Found(i) => Some(i),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
enum Tier {
    Exact,
    Aliased,
}

fn position_tier(rel: &dyn TypeRelation, arg: TypeId, param: TypeId) -> Option<Tier> {
    if arg == param {
        Some(Tier::Exact)
    } else if aliases(rel, arg, param) {
        Some(Tier::Aliased)
    } else {
        None
    }
}

/// Worst tier over all positions, or `None` if some position fails.
pub(crate) fn match_tier(rel: &dyn TypeRelation, args: &[TypeId], params: &[ParamSig]) -> Option<u8> {
    if args.len() != params.len() {
        return None;
    }
    let mut worst = Tier::Exact;
    for (&a, p) in args.iter().zip(params) {
        worst = worst.max(position_tier(rel, a, p.ty)?);
    }
    Some(worst as u8)
}

/// Pick among candidates by tier. `tiers[i]` is candidate `i`'s match tier.
pub(crate) fn pick(tiers: impl Iterator<Item = Option<u8>>) -> Resolution {
    let mut best: Option<u8> = None;
    let mut winners: SmallVec<[usize; 4]> = SmallVec::new();
    for (i, tier) in tiers.enumerate() {
        let Some(t) = tier else { continue };
        match best {
            Some(b) if t > b => {}
            Some(b) if t == b => winners.push(i),
            _ => {
                best = Some(t);
                winners.clear();
                winners.push(i);
            }
        }
    }
    match (best, winners.as_slice()) {
        (None, _) => Resolution::NotFound,
        (Some(_), [only]) => Resolution::Found(*only),
        (Some(_), many) => Resolution::Ambiguous(many.len()),
    }
}

fn same_types(a: &[ParamSig], b: &[ParamSig]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.ty == y.ty)
}

/// All overloads sharing one name, in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverloadSet {
    overloads: Vec<Overload>,
}

impl OverloadSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an overload. Parameter types identical to an existing overload's
    /// are rejected whatever the reference flags, since callers could not
    /// tell the two apart; the set is not modified.
    pub fn insert(&mut self, overload: Overload) -> Result<usize, Overload> {
        if self.overloads.iter().any(|o| same_types(&o.params, &overload.params)) {
            return Err(overload);
        }
        self.overloads.push(overload);
        Ok(self.overloads.len() - 1)
    }

    pub fn resolve(&self, rel: &dyn TypeRelation, args: &[TypeId]) -> Resolution {
        pick(
            self.overloads
                .iter()
                .map(|o| match_tier(rel, args, &o.params)),
        )
    }

    pub fn get(&self, index: usize) -> Option<&Overload> {
        self.overloads.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Overload> {
        self.overloads.get_mut(index)
    }

    pub fn by_function_mut(&mut self, f: FunctionId) -> Option<&mut Overload> {
        self.overloads.iter_mut().find(|o| o.function == f)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Overload> {
        self.overloads.iter()
    }

    pub fn len(&self) -> usize {
        self.overloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overloads.is_empty()
    }
}
