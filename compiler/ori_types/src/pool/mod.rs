//! The unified type pool.
//!
//! Types are hash-consed: structurally equal types always share an `Idx`.
//! Variable-length payloads (tuple elements, function signatures, generic
//! arguments) live in a flat `extra` array addressed by the item's `data`.

mod construct;
mod format;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::registry::{DeclId, NominalKind, OpaqueId, ProtocolId, Registry};
use crate::subst::GenericParamKey;
use crate::{Idx, Item, Tag, TypeFlags};

/// Interning key: the tag plus its full payload.
#[derive(Clone, PartialEq, Eq, Hash)]
struct ItemKey {
    tag: Tag,
    payload: SmallVec<[u32; 4]>,
}

/// Interned type storage plus the declaration registry.
#[derive(Clone, Debug)]
pub struct Pool {
    items: Vec<Item>,
    flags: Vec<TypeFlags>,
    extra: Vec<u32>,
    intern_map: FxHashMap<ItemKey, Idx>,
    registry: Registry,
}

impl std::fmt::Debug for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}", self.tag, self.payload.as_slice())
    }
}

const PRIMITIVE_TAGS: [Tag; Idx::PRIMITIVE_COUNT as usize] = [
    Tag::Bool,
    Tag::Int8,
    Tag::Int32,
    Tag::Int64,
    Tag::Float64,
    Tag::Unit,
    Tag::Never,
    Tag::RawPointer,
    Tag::NativeObject,
    Tag::Any,
];

impl Pool {
    /// Create a pool with all primitives pre-interned.
    pub fn new() -> Self {
        let mut pool = Self {
            items: Vec::with_capacity(256),
            flags: Vec::with_capacity(256),
            extra: Vec::with_capacity(1024),
            intern_map: FxHashMap::default(),
            registry: Registry::default(),
        };
        for tag in PRIMITIVE_TAGS {
            let idx = pool.push(Item::primitive(tag), TypeFlags::IS_PRIMITIVE);
            pool.intern_map.insert(
                ItemKey {
                    tag,
                    payload: SmallVec::new(),
                },
                idx,
            );
        }
        debug_assert_eq!(pool.len(), Idx::FIRST_DYNAMIC as usize);
        pool
    }

    #[allow(clippy::cast_possible_truncation)]
    fn push(&mut self, item: Item, flags: TypeFlags) -> Idx {
        let idx = Idx::from_raw(self.items.len() as u32);
        self.items.push(item);
        self.flags.push(flags);
        idx
    }

    /// Intern a type whose `data` is a single word (simple containers and
    /// generic parameters).
    pub fn intern(&mut self, tag: Tag, data: u32) -> Idx {
        debug_assert!(!tag.uses_extra(), "{tag:?} must use intern_complex");
        let key = ItemKey {
            tag,
            payload: SmallVec::from_slice(&[data]),
        };
        if let Some(&idx) = self.intern_map.get(&key) {
            return idx;
        }
        let flags = self.compute_flags(tag, &[data]);
        let idx = self.push(Item::new(tag, data), flags);
        self.intern_map.insert(key, idx);
        idx
    }

    /// Intern a type whose payload lives in the extra array.
    #[allow(clippy::cast_possible_truncation)]
    pub fn intern_complex(&mut self, tag: Tag, payload: &[u32]) -> Idx {
        debug_assert!(tag.uses_extra(), "{tag:?} must use intern");
        let key = ItemKey {
            tag,
            payload: SmallVec::from_slice(payload),
        };
        if let Some(&idx) = self.intern_map.get(&key) {
            return idx;
        }
        let flags = self.compute_flags(tag, payload);
        let start = self.extra.len() as u32;
        self.extra.extend_from_slice(payload);
        let idx = self.push(Item::new(tag, start), flags);
        self.intern_map.insert(key, idx);
        idx
    }

    fn compute_flags(&self, tag: Tag, payload: &[u32]) -> TypeFlags {
        let children = |raws: &[u32]| {
            TypeFlags::propagate_all(raws.iter().map(|&r| self.flags[r as usize]))
        };
        match tag {
            Tag::Address => TypeFlags::HAS_ADDRESS | children(payload),
            Tag::Metatype | Tag::Optional => children(payload),
            Tag::Tuple => children(&payload[1..]),
            Tag::Function => TypeFlags::IS_FUNCTION | children(&payload[1..]),
            Tag::Struct | Tag::Enum => TypeFlags::IS_NOMINAL | children(&payload[2..]),
            Tag::Class => TypeFlags::IS_NOMINAL | TypeFlags::IS_CLASS | children(&payload[2..]),
            Tag::Opaque => TypeFlags::HAS_OPAQUE | children(&payload[2..]),
            Tag::Existential => TypeFlags::HAS_EXISTENTIAL,
            Tag::GenericParam => TypeFlags::HAS_TYPE_PARAM | TypeFlags::NEEDS_SUBST,
            _ => TypeFlags::IS_PRIMITIVE,
        }
    }

    // === Accessors ===

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// # Panics
    /// Panics if `idx` was not issued by this pool.
    #[inline]
    pub fn tag(&self, idx: Idx) -> Tag {
        self.items[idx.index()].tag
    }

    #[inline]
    pub fn flags(&self, idx: Idx) -> TypeFlags {
        self.flags[idx.index()]
    }

    #[inline]
    fn data(&self, idx: Idx) -> u32 {
        self.items[idx.index()].data
    }

    /// Length-prefixed slice starting at the item's extra index.
    fn counted(&self, start: usize) -> &[u32] {
        let n = self.extra[start] as usize;
        &self.extra[start + 1..start + 1 + n]
    }

    fn to_idx(raws: &[u32]) -> Vec<Idx> {
        raws.iter().copied().map(Idx::from_raw).collect()
    }

    /// Child of a simple container (address, metatype, optional).
    #[inline]
    pub fn child(&self, idx: Idx) -> Idx {
        debug_assert!(self.tag(idx).is_simple_container());
        Idx::from_raw(self.data(idx))
    }

    pub fn tuple_elems(&self, idx: Idx) -> Vec<Idx> {
        match self.tag(idx) {
            Tag::Tuple => Self::to_idx(self.counted(self.data(idx) as usize)),
            Tag::Unit => Vec::new(),
            tag => panic!("tuple_elems on {tag:?}"),
        }
    }

    /// Parameter types of a function type.
    pub fn function_params(&self, idx: Idx) -> Vec<Idx> {
        debug_assert_eq!(self.tag(idx), Tag::Function);
        Self::to_idx(self.counted(self.data(idx) as usize))
    }

    pub fn function_return(&self, idx: Idx) -> Idx {
        debug_assert_eq!(self.tag(idx), Tag::Function);
        let start = self.data(idx) as usize;
        let n = self.extra[start] as usize;
        Idx::from_raw(self.extra[start + 1 + n])
    }

    pub fn nominal_decl(&self, idx: Idx) -> DeclId {
        debug_assert!(self.tag(idx).is_nominal());
        DeclId::new(self.extra[self.data(idx) as usize])
    }

    /// Generic arguments of a nominal or opaque type.
    pub fn generic_args(&self, idx: Idx) -> Vec<Idx> {
        debug_assert!(self.tag(idx).is_nominal() || self.tag(idx) == Tag::Opaque);
        Self::to_idx(self.counted(self.data(idx) as usize + 1))
    }

    pub fn opaque_decl(&self, idx: Idx) -> OpaqueId {
        debug_assert_eq!(self.tag(idx), Tag::Opaque);
        OpaqueId::new(self.extra[self.data(idx) as usize])
    }

    /// Protocols of an existential, sorted. Empty for `Any`.
    pub fn existential_protocols(&self, idx: Idx) -> Vec<ProtocolId> {
        match self.tag(idx) {
            Tag::Existential => self
                .counted(self.data(idx) as usize)
                .iter()
                .copied()
                .map(ProtocolId::new)
                .collect(),
            Tag::Any => Vec::new(),
            tag => panic!("existential_protocols on {tag:?}"),
        }
    }

    pub fn generic_param_key(&self, idx: Idx) -> GenericParamKey {
        debug_assert_eq!(self.tag(idx), Tag::GenericParam);
        GenericParamKey::unpack(self.data(idx))
    }

    // === Registry ===

    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[inline]
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    // === Queries ===

    pub fn is_class(&self, idx: Idx) -> bool {
        self.tag(idx) == Tag::Class
    }

    /// Existential (including `Any`).
    pub fn is_existential(&self, idx: Idx) -> bool {
        matches!(self.tag(idx), Tag::Existential | Tag::Any)
    }

    /// An existential whose protocols require a class.
    pub fn is_class_bound_existential(&self, idx: Idx) -> bool {
        self.tag(idx) == Tag::Existential
            && self
                .existential_protocols(idx)
                .iter()
                .any(|&p| self.registry.is_class_bound(p))
    }

    /// Whether a concrete type is known to conform to `protocol`.
    ///
    /// Generic parameters and opaque types never answer `true` here; their
    /// conformances come from substitution maps.
    pub fn conforms_to(&self, ty: Idx, protocol: ProtocolId) -> bool {
        match self.tag(ty) {
            Tag::Struct | Tag::Enum | Tag::Class => {
                let decl = self.nominal_decl(ty);
                if self.registry.nominal_conforms(decl, protocol) {
                    return true;
                }
                // Conformances are inherited from superclasses.
                self.tag(ty) == Tag::Class
                    && self
                        .registry
                        .nominal(decl)
                        .superclass
                        .is_some_and(|sup| self.conforms_to(sup, protocol))
            }
            Tag::Existential => {
                // An existential conforms to what its protocols imply.
                self.existential_protocols(ty)
                    .iter()
                    .any(|&p| self.registry.protocol_implies(p, protocol))
            }
            _ => self.registry.builtin_conforms(ty, protocol),
        }
    }

    /// Kind of the nominal declaration behind `idx`, if any.
    pub fn nominal_kind(&self, idx: Idx) -> Option<NominalKind> {
        self.tag(idx)
            .is_nominal()
            .then(|| self.registry.nominal(self.nominal_decl(idx)).kind)
    }

    /// Stored field (or enum payload) types of a nominal with its generic
    /// arguments applied.
    pub fn field_types(&mut self, ty: Idx) -> Vec<Idx> {
        let decl = self.nominal_decl(ty);
        let args = self.generic_args(ty);
        let fields = self.registry.nominal(decl).fields.clone();
        fields
            .into_iter()
            .map(|f| self.apply_generic_args(f, &args))
            .collect()
    }

    /// Direct superclass of a class type with its generic arguments applied.
    pub fn superclass(&mut self, ty: Idx) -> Option<Idx> {
        if self.tag(ty) != Tag::Class {
            return None;
        }
        let decl = self.nominal_decl(ty);
        let args = self.generic_args(ty);
        let sup = self.registry.nominal(decl).superclass?;
        Some(self.apply_generic_args(sup, &args))
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}
