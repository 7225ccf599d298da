//! Runtime values.

use std::fmt;

/// Base tag for function addresses; the low bits hold the `FunctionId`.
pub const FUNC_BASE: u64 = 1 << 62;

/// A runtime value.
#[derive(Clone, Debug, PartialEq)]
pub enum Val {
    /// Integer normalized to its type's width.
    Int(i64),
    Float(f64),
    Ptr(u64),
    /// Struct or array contents.
    Agg(Vec<Val>),
    Void,
}

impl Val {
    /// Integer view of an integer or pointer.
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Val::Int(i) => Some(i),
            Val::Ptr(p) => Some(p as i64),
            _ => None,
        }
    }

    /// Address view of a pointer or integer.
    pub fn as_ptr(&self) -> Option<u64> {
        match *self {
            Val::Ptr(p) => Some(p),
            Val::Int(i) => Some(i as u64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Val::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_int().map(|i| i != 0)
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Int(i) => write!(f, "{i}"),
            Val::Float(x) => write!(f, "{x}"),
            Val::Ptr(p) => write!(f, "{p:#x}"),
            Val::Agg(items) => {
                f.write_str("{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("}")
            }
            Val::Void => f.write_str("void"),
        }
    }
}
