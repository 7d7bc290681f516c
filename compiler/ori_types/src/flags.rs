//! Pre-computed type metadata flags.
//!
//! `TypeFlags` are computed once at interning time so substitution and
//! lowering can skip whole subtrees without traversal.

use bitflags::bitflags;

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct TypeFlags: u32 {
        // === Presence Flags (bits 0-7) ===

        /// Contains a generic parameter.
        const HAS_TYPE_PARAM = 1 << 0;
        /// Contains an opaque result type.
        const HAS_OPAQUE = 1 << 1;
        /// Contains an existential.
        const HAS_EXISTENTIAL = 1 << 2;
        /// Contains an address type.
        const HAS_ADDRESS = 1 << 3;

        // === Category Flags (bits 8-15) ===

        const IS_PRIMITIVE = 1 << 8;
        /// Struct, enum, or class.
        const IS_NOMINAL = 1 << 9;
        const IS_FUNCTION = 1 << 10;
        const IS_CLASS = 1 << 11;

        // === Optimization Flags (bits 16-23) ===

        /// Substitution may change this type.
        const NEEDS_SUBST = 1 << 16;
    }
}

impl TypeFlags {
    /// Flags inherited by compound types from their children.
    pub const PROPAGATE_MASK: Self = Self::from_bits_truncate(
        Self::HAS_TYPE_PARAM.bits()
            | Self::HAS_OPAQUE.bits()
            | Self::HAS_EXISTENTIAL.bits()
            | Self::HAS_ADDRESS.bits()
            | Self::NEEDS_SUBST.bits(),
    );

    #[inline]
    pub const fn propagate_from(child: Self) -> Self {
        Self::from_bits_truncate(child.bits() & Self::PROPAGATE_MASK.bits())
    }

    /// Combine propagated flags from multiple children.
    #[inline]
    pub fn propagate_all(children: impl IntoIterator<Item = Self>) -> Self {
        let mut result = Self::empty();
        for child in children {
            result = result.union(Self::propagate_from(child));
        }
        result
    }

    #[inline]
    pub const fn has_type_params(self) -> bool {
        self.contains(Self::HAS_TYPE_PARAM)
    }

    #[inline]
    pub const fn has_opaque(self) -> bool {
        self.contains(Self::HAS_OPAQUE)
    }

    /// Check if substitution has any work to do.
    #[inline]
    pub const fn needs_subst(self) -> bool {
        self.contains(Self::NEEDS_SUBST)
    }
}

#[cfg(test)]
mod tests;
