//! Unified type index handle.
//!
//! `Idx` is the canonical type representation. Every type lives in the
//! [`Pool`](crate::Pool) and is referenced by a 32-bit index, so type
//! equality is index equality.

use std::fmt;

/// A 32-bit index into the type pool.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Idx(u32);

impl Idx {
    // === Primitive Types (indices 0-9) ===
    // Pre-interned at pool creation.

    /// The `Bool` type.
    pub const BOOL: Self = Self(0);
    /// 8-bit signed integer.
    pub const INT8: Self = Self(1);
    /// 32-bit signed integer.
    pub const INT32: Self = Self(2);
    /// 64-bit signed integer.
    pub const INT64: Self = Self(3);
    /// 64-bit floating point.
    pub const FLOAT64: Self = Self(4);
    /// The unit type `()` (also the empty tuple).
    pub const UNIT: Self = Self(5);
    /// The uninhabited type.
    pub const NEVER: Self = Self(6);
    /// An untyped machine pointer.
    pub const RAW_POINTER: Self = Self(7);
    /// An opaque reference-counted object of unknown class.
    pub const NATIVE_OBJECT: Self = Self(8);
    /// The existential with no constraints (`any`).
    pub const ANY: Self = Self(9);

    /// Number of pre-interned primitive types.
    pub const PRIMITIVE_COUNT: u32 = 10;

    /// First index for dynamically interned types.
    pub const FIRST_DYNAMIC: u32 = Self::PRIMITIVE_COUNT;

    /// Sentinel value indicating no type.
    pub const NONE: Self = Self(u32::MAX);

    /// Create an index from a raw u32 value.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw u32 value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as a `usize` for slice access.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Check if this is a pre-interned primitive.
    #[inline]
    pub const fn is_primitive(self) -> bool {
        self.0 < Self::FIRST_DYNAMIC
    }

    /// Check if this is the NONE sentinel.
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline]
    pub const fn is_never(self) -> bool {
        self.0 == Self::NEVER.0
    }

    #[inline]
    pub const fn is_unit(self) -> bool {
        self.0 == Self::UNIT.0
    }

    /// Human-readable name for primitives, `None` for dynamic types.
    #[inline]
    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("Bool"),
            1 => Some("Int8"),
            2 => Some("Int32"),
            3 => Some("Int64"),
            4 => Some("Float64"),
            5 => Some("()"),
            6 => Some("Never"),
            7 => Some("RawPointer"),
            8 => Some("NativeObject"),
            9 => Some("Any"),
            _ => None,
        }
    }
}

impl fmt::Debug for Idx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (*self, self.name()) {
            (Self::NONE, _) => write!(f, "Idx::NONE"),
            (_, Some(name)) => write!(f, "Idx::{name}"),
            _ => write!(f, "Idx({})", self.0),
        }
    }
}

impl fmt::Display for Idx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (*self, self.name()) {
            (Self::NONE, _) => write!(f, "<none>"),
            (_, Some(name)) => write!(f, "{name}"),
            _ => write!(f, "type#{}", self.0),
        }
    }
}

const _: () = assert!(std::mem::size_of::<Idx>() == 4);
