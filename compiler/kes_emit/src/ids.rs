//! Opaque ID newtypes handed out by a [`CodeEmitter`](crate::CodeEmitter).
//!
//! Each ID is a `u32` index into the corresponding table of the emitter
//! that produced it. A `NONE` sentinel (`u32::MAX`) marks absent values.
//! Callers never see backend internals, only these `Copy` handles.

use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Sentinel for "absent".
            pub const NONE: Self = Self(u32::MAX);

            /// Create from a raw index.
            #[inline]
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            /// True if this is the `NONE` sentinel.
            #[inline]
            pub const fn is_none(self) -> bool {
                self.0 == u32::MAX
            }

            /// The raw index.
            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// The raw index as `usize`.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_none() {
                    write!(f, concat!($prefix, "NONE"))
                } else {
                    write!(f, concat!($prefix, "{}"), self.0)
                }
            }
        }
    };
}

define_id!(
    /// Handle to an SSA value, constant, global or function pointer.
    ValueId,
    "%v"
);
define_id!(
    /// Handle to a backend type.
    TypeId,
    "t"
);
define_id!(
    /// Handle to a basic block.
    BlockId,
    "bb"
);
define_id!(
    /// Handle to a function.
    FunctionId,
    "fn"
);

pub(crate) fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or_else(|_| panic!("IR table exceeded {} entries", u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_sentinel() {
        assert!(ValueId::NONE.is_none());
        assert!(!BlockId::from_raw(0).is_none());
        assert_eq!(format!("{:?}", TypeId::from_raw(3)), "t3");
        assert_eq!(format!("{:?}", FunctionId::NONE), "fnNONE");
    }
}
