//! Type kind tag for tag-driven dispatch.
//!
//! Each type in the pool has a `Tag` that identifies its kind and
//! determines how to interpret the associated `data` field.
//!
//! # Tag Categories
//!
//! - 0-15: Primitives (data unused)
//! - 16-31: Simple containers (data = child Idx)
//! - 48-79: Structural types (data = extra index with length)
//! - 80-95: Nominal types (data = extra index: `[decl, n, args...]`)
//! - 96-111: Existentials (data = extra index: `[n, protocols...]`)
//! - 112-127: Generic parameters (data = packed depth/index)

use std::fmt;

/// Type kind discriminant.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Tag {
    // === Primitives (0-15) ===
    Bool = 0,
    Int8 = 1,
    Int32 = 2,
    Int64 = 3,
    Float64 = 4,
    Unit = 5,
    Never = 6,
    RawPointer = 7,
    NativeObject = 8,
    Any = 9,

    // === Simple Containers (16-31) ===
    /// The address of a value of the child type.
    Address = 16,
    /// The metatype `T.Type`.
    Metatype = 17,
    /// `T?`.
    Optional = 18,

    // === Structural (48-79) ===
    /// `(T1, T2, ...)`. Layout: `[n, elems...]`.
    Tuple = 48,
    /// `(P1, P2, ...) -> R`. Layout: `[n, params..., ret]`.
    Function = 49,

    // === Nominal (80-95) ===
    // Layout: [decl, n, args...]
    Struct = 80,
    Enum = 81,
    Class = 82,
    /// Opaque result type; `decl` is an `OpaqueId`.
    Opaque = 83,

    // === Existentials (96-111) ===
    /// `any P & Q`. Layout: `[n, protocols...]`, protocols sorted.
    Existential = 96,

    // === Generic Parameters (112-127) ===
    /// data: `depth << 16 | index`.
    GenericParam = 112,
}

impl Tag {
    /// Check if this tag uses the extra array for data.
    #[inline]
    pub const fn uses_extra(self) -> bool {
        matches!(
            self,
            Self::Tuple
                | Self::Function
                | Self::Struct
                | Self::Enum
                | Self::Class
                | Self::Opaque
                | Self::Existential
        )
    }

    #[inline]
    pub const fn is_primitive(self) -> bool {
        (self as u8) < 16
    }

    /// Check if the data field holds a single child `Idx`.
    #[inline]
    pub const fn is_simple_container(self) -> bool {
        let v = self as u8;
        v >= 16 && v < 32
    }

    /// Struct, enum, or class (not opaque).
    #[inline]
    pub const fn is_nominal(self) -> bool {
        matches!(self, Self::Struct | Self::Enum | Self::Class)
    }

    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::Int8 => "Int8",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::Float64 => "Float64",
            Self::Unit => "()",
            Self::Never => "Never",
            Self::RawPointer => "RawPointer",
            Self::NativeObject => "NativeObject",
            Self::Any => "Any",
            Self::Address => "address",
            Self::Metatype => "metatype",
            Self::Optional => "optional",
            Self::Tuple => "tuple",
            Self::Function => "function",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Class => "class",
            Self::Opaque => "opaque",
            Self::Existential => "existential",
            Self::GenericParam => "generic_param",
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag::{}", self.name())
    }
}

#[cfg(test)]
mod tests;
