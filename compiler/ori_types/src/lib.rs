//! Type system for the Ori SSA IR.
//!
//! - [`Pool`]: hash-consed type storage addressed by [`Idx`]
//! - [`registry`]: nominal, protocol and opaque declarations
//! - [`subst`]: generic signatures, conformances, substitution maps
//! - [`lowering`]: trivial / loadable / address-only classification
//!
//! Types compare by index, so structural equality is O(1) and substitution
//! results can be used directly as map keys.

mod flags;
mod idx;
mod item;
pub mod lowering;
mod pool;
pub mod registry;
pub mod subst;
mod tag;
mod traverse;

pub use flags::TypeFlags;
pub use idx::Idx;
pub use item::Item;
pub use lowering::{LoweringContext, TypeLowering, TypeProperties};
pub use pool::Pool;
pub use registry::{
    DeclId, ModuleId, NominalDecl, NominalKind, OpaqueDecl, OpaqueId, ProtocolDecl, ProtocolId,
    Registry,
};
pub use subst::{Conformance, GenericParamKey, GenericSignature, Requirement, SubstitutionMap};
pub use tag::Tag;
pub use traverse::{super_fold, TypeFolder};

#[cfg(target_pointer_width = "64")]
mod size_asserts {
    use super::{Idx, Item};
    const _: () = assert!(std::mem::size_of::<Idx>() == 4);
    const _: () = assert!(std::mem::size_of::<Item>() == 8);
}
