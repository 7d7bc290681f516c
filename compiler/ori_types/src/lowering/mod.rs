//! Type lowering: how values of a type are represented in SSA.
//!
//! A type is *trivial* when copying it is a bitwise copy, and
//! *address-only* when its values cannot be held in SSA registers and must
//! live in memory (unknown layout, resilience, unresolved generics).
//! Everything that is not address-only is *loadable*.
//!
//! Lowering depends on the [`LoweringContext`]: the same resilient struct is
//! loadable inside its defining module and address-only outside it, and an
//! opaque result type is looked through only when its underlying type is
//! visible.

use bitflags::bitflags;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::registry::{ModuleId, NominalKind};
use crate::traverse::{super_fold, TypeFolder};
use crate::{Idx, Pool, Tag};

bitflags! {
    /// Lowered representation properties of a type.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct TypeProperties: u8 {
        /// Copies need retain/release or a value witness.
        const NON_TRIVIAL = 1 << 0;
        /// Values must be manipulated indirectly.
        const ADDRESS_ONLY = 1 << 1;
        /// Layout hidden by library evolution.
        const RESILIENT = 1 << 2;
        /// Contains a generic parameter with no concrete binding.
        const UNRESOLVED = 1 << 3;
    }
}

impl TypeProperties {
    #[inline]
    pub const fn is_trivial(self) -> bool {
        !self.contains(Self::NON_TRIVIAL)
    }

    #[inline]
    pub const fn is_address_only(self) -> bool {
        self.contains(Self::ADDRESS_ONLY)
    }

    #[inline]
    pub const fn is_loadable(self) -> bool {
        !self.is_address_only()
    }

    const OPAQUE_VALUE: Self = Self::NON_TRIVIAL.union(Self::ADDRESS_ONLY);
}

/// Where lowering is performed from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LoweringContext {
    /// Module containing the code being lowered.
    pub module: ModuleId,
    /// Every module's declarations are visible.
    pub whole_module: bool,
    /// The code is serialized for inlining into other modules, so it may
    /// not depend on any module-private layout.
    pub serialized: bool,
}

impl LoweringContext {
    pub const fn new(module: ModuleId) -> Self {
        Self {
            module,
            whole_module: false,
            serialized: false,
        }
    }

    #[must_use]
    pub const fn whole_module(mut self, on: bool) -> Self {
        self.whole_module = on;
        self
    }

    #[must_use]
    pub const fn serialized(mut self, on: bool) -> Self {
        self.serialized = on;
        self
    }

    /// Whether internal details of declarations from `owner` are visible.
    #[inline]
    pub fn can_see_into(&self, owner: ModuleId) -> bool {
        !self.serialized && (self.whole_module || owner == self.module)
    }
}

impl Default for LoweringContext {
    fn default() -> Self {
        Self::new(ModuleId::MAIN)
    }
}

/// Cached type lowering for one [`LoweringContext`].
#[derive(Debug, Default)]
pub struct TypeLowering {
    ctx: LoweringContext,
    cache: FxHashMap<Idx, TypeProperties>,
    in_progress: FxHashSet<Idx>,
}

impl TypeLowering {
    pub fn new(ctx: LoweringContext) -> Self {
        Self {
            ctx,
            cache: FxHashMap::default(),
            in_progress: FxHashSet::default(),
        }
    }

    #[inline]
    pub fn context(&self) -> LoweringContext {
        self.ctx
    }

    pub fn is_trivial(&mut self, pool: &mut Pool, ty: Idx) -> bool {
        self.properties(pool, ty).is_trivial()
    }

    pub fn is_address_only(&mut self, pool: &mut Pool, ty: Idx) -> bool {
        self.properties(pool, ty).is_address_only()
    }

    pub fn is_loadable(&mut self, pool: &mut Pool, ty: Idx) -> bool {
        self.properties(pool, ty).is_loadable()
    }

    /// Compute (or fetch) the properties of `ty`.
    pub fn properties(&mut self, pool: &mut Pool, ty: Idx) -> TypeProperties {
        if let Some(&props) = self.cache.get(&ty) {
            return props;
        }
        // A type reached again while computing its own properties is only
        // reachable through indirection; treat it as a loadable reference.
        if !self.in_progress.insert(ty) {
            return TypeProperties::NON_TRIVIAL;
        }
        let props = self.compute(pool, ty);
        self.in_progress.remove(&ty);
        self.cache.insert(ty, props);
        props
    }

    fn union_of(&mut self, pool: &mut Pool, tys: &[Idx]) -> TypeProperties {
        tys.iter()
            .fold(TypeProperties::empty(), |acc, &t| acc | self.properties(pool, t))
    }

    fn compute(&mut self, pool: &mut Pool, ty: Idx) -> TypeProperties {
        match pool.tag(ty) {
            Tag::Bool
            | Tag::Int8
            | Tag::Int32
            | Tag::Int64
            | Tag::Float64
            | Tag::Unit
            | Tag::Never
            | Tag::RawPointer
            | Tag::Address
            | Tag::Metatype => TypeProperties::empty(),
            Tag::NativeObject | Tag::Function | Tag::Class => TypeProperties::NON_TRIVIAL,
            Tag::Any => TypeProperties::OPAQUE_VALUE,
            Tag::Existential => {
                if pool.is_class_bound_existential(ty) {
                    TypeProperties::NON_TRIVIAL
                } else {
                    TypeProperties::OPAQUE_VALUE
                }
            }
            Tag::GenericParam => TypeProperties::OPAQUE_VALUE | TypeProperties::UNRESOLVED,
            Tag::Optional => {
                let payload = pool.child(ty);
                self.properties(pool, payload)
            }
            Tag::Tuple => {
                let elems = pool.tuple_elems(ty);
                self.union_of(pool, &elems)
            }
            Tag::Struct | Tag::Enum => {
                let decl = pool.registry().nominal(pool.nominal_decl(ty));
                debug_assert_ne!(decl.kind, NominalKind::Class);
                if decl.resilient && !self.ctx.can_see_into(decl.module) {
                    return TypeProperties::OPAQUE_VALUE | TypeProperties::RESILIENT;
                }
                let fields = pool.field_types(ty);
                self.union_of(pool, &fields)
            }
            Tag::Opaque => match self.underlying(pool, ty) {
                Some(underlying) => self.properties(pool, underlying),
                None => TypeProperties::OPAQUE_VALUE,
            },
        }
    }

    /// The underlying type of an opaque, if visible from this context.
    fn underlying(&self, pool: &mut Pool, ty: Idx) -> Option<Idx> {
        let decl = pool.registry().opaque(pool.opaque_decl(ty));
        if !self.ctx.can_see_into(decl.module) {
            return None;
        }
        let underlying = decl.underlying?;
        let args = pool.generic_args(ty);
        Some(pool.apply_generic_args(underlying, &args))
    }

    /// The type as it is represented in this context: every visible opaque
    /// result type is replaced by its underlying type.
    pub fn lower(&mut self, pool: &mut Pool, ty: Idx) -> Idx {
        if !pool.flags(ty).has_opaque() {
            return ty;
        }
        super_fold(&mut OpaqueExpander { lowering: self }, pool, ty)
    }
}

struct OpaqueExpander<'a> {
    lowering: &'a TypeLowering,
}

impl TypeFolder for OpaqueExpander<'_> {
    fn skip(&self, pool: &Pool, ty: Idx) -> bool {
        !pool.flags(ty).has_opaque()
    }

    fn fold_opaque(&mut self, pool: &mut Pool, ty: Idx) -> Idx {
        match self.lowering.underlying(pool, ty) {
            Some(underlying) => self.fold(pool, underlying),
            None => {
                let decl = pool.opaque_decl(ty);
                let args = pool.generic_args(ty);
                let args: Vec<Idx> = args.iter().map(|&a| self.fold(pool, a)).collect();
                pool.opaque(decl, &args)
            }
        }
    }
}
