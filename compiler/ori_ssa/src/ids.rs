//! Arena index newtypes.
//!
//! Every IR entity lives in an arena owned by its function (values,
//! instructions, blocks) or module (functions, debug scopes) and is named
//! by a stable `u32` index. Ids are never reused within their arena.

use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// Get the index as `usize` (for indexing into `Vec`s).
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            #[allow(clippy::cast_possible_truncation)]
            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(
    /// An SSA value: instruction result, block parameter, or undef.
    ValueId,
    "%"
);
define_id!(
    /// An instruction within a function.
    InstId,
    "i"
);
define_id!(
    /// A basic block within a function.
    BlockId,
    "bb"
);
define_id!(
    /// A function within a module.
    FuncId,
    "@f"
);
define_id!(
    /// A debug scope within a module's scope table.
    ScopeId,
    "scope"
);
