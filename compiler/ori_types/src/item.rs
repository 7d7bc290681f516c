//! Compact type item storage.

use crate::Tag;

/// A single type item in the pool.
///
/// - `tag`: Identifies the type kind (see [`Tag`])
/// - `data`: Meaning depends on tag (child index, extra index, or packed key)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct Item {
    pub tag: Tag,
    pub data: u32,
}

impl Item {
    #[inline]
    pub const fn new(tag: Tag, data: u32) -> Self {
        Self { tag, data }
    }

    #[inline]
    pub const fn primitive(tag: Tag) -> Self {
        Self { tag, data: 0 }
    }
}
