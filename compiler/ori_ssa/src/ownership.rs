//! Value ownership kinds.
//!
//! In ownership SSA every value is tagged with how it may be consumed.
//! `None` marks values with no ownership semantics (trivial values and
//! addresses); it is compatible with every other kind. The remaining kinds
//! only merge with themselves.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum OwnershipKind {
    /// Trivial or address value; no lifetime obligations.
    #[default]
    None,
    /// Unmanaged reference; must be copied before use as owned.
    Unowned,
    /// Owned value; must be consumed exactly once.
    Owned,
    /// Borrowed value valid within a borrow scope.
    Guaranteed,
}

impl OwnershipKind {
    /// Merge two ownership kinds at a control-flow join.
    ///
    /// Returns `None` (the `Option`) when the kinds conflict.
    #[inline]
    pub const fn merge(self, other: Self) -> Option<Self> {
        match (self, other) {
            (Self::None, k) | (k, Self::None) => Some(k),
            (Self::Unowned, Self::Unowned) => Some(Self::Unowned),
            (Self::Owned, Self::Owned) => Some(Self::Owned),
            (Self::Guaranteed, Self::Guaranteed) => Some(Self::Guaranteed),
            _ => Option::None,
        }
    }

    /// Fold a sequence of kinds with [`merge`](Self::merge).
    pub fn merge_all(kinds: impl IntoIterator<Item = Self>) -> Option<Self> {
        kinds
            .into_iter()
            .try_fold(Self::None, |acc, k| acc.merge(k))
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for OwnershipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Unowned => "unowned",
            Self::Owned => "owned",
            Self::Guaranteed => "guaranteed",
        })
    }
}
