//! Type construction helpers for the Pool.

use crate::registry::{DeclId, NominalKind, OpaqueId, ProtocolId};
use crate::subst::GenericParamKey;
use crate::{Idx, Pool, Tag};

impl Pool {
    // === Simple Container Constructors ===

    /// The address of a `pointee` in memory.
    pub fn address(&mut self, pointee: Idx) -> Idx {
        self.intern(Tag::Address, pointee.raw())
    }

    /// `instance.Type`.
    pub fn metatype(&mut self, instance: Idx) -> Idx {
        self.intern(Tag::Metatype, instance.raw())
    }

    /// `payload?`.
    pub fn optional(&mut self, payload: Idx) -> Idx {
        self.intern(Tag::Optional, payload.raw())
    }

    // === Structural Constructors ===

    /// Create a tuple type. Empty tuples return `Idx::UNIT`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn tuple(&mut self, elems: &[Idx]) -> Idx {
        if elems.is_empty() {
            return Idx::UNIT;
        }

        // Layout: [elem_count, elem0, elem1, ...]
        let mut extra = Vec::with_capacity(elems.len() + 1);
        extra.push(elems.len() as u32);
        extra.extend(elems.iter().map(|e| e.raw()));
        self.intern_complex(Tag::Tuple, &extra)
    }

    /// Create a function type `(params...) -> ret`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn function(&mut self, params: &[Idx], ret: Idx) -> Idx {
        // Layout: [param_count, param0, param1, ..., return_type]
        let mut extra = Vec::with_capacity(params.len() + 2);
        extra.push(params.len() as u32);
        extra.extend(params.iter().map(|p| p.raw()));
        extra.push(ret.raw());
        self.intern_complex(Tag::Function, &extra)
    }

    // === Nominal Constructors ===

    /// Apply a struct, enum or class declaration to generic arguments.
    ///
    /// # Panics
    /// Panics if the argument count differs from the declaration's.
    #[allow(clippy::cast_possible_truncation)]
    pub fn nominal(&mut self, decl: DeclId, args: &[Idx]) -> Idx {
        let info = self.registry().nominal(decl);
        assert_eq!(
            usize::from(info.generic_params),
            args.len(),
            "wrong number of generic arguments for {}",
            info.name
        );
        let tag = match info.kind {
            NominalKind::Struct => Tag::Struct,
            NominalKind::Enum => Tag::Enum,
            NominalKind::Class => Tag::Class,
        };

        // Layout: [decl, arg_count, args...]
        let mut extra = Vec::with_capacity(args.len() + 2);
        extra.push(decl.raw());
        extra.push(args.len() as u32);
        extra.extend(args.iter().map(|a| a.raw()));
        self.intern_complex(tag, &extra)
    }

    /// Apply an opaque result declaration to generic arguments.
    #[allow(clippy::cast_possible_truncation)]
    pub fn opaque(&mut self, decl: OpaqueId, args: &[Idx]) -> Idx {
        debug_assert_eq!(
            usize::from(self.registry().opaque(decl).generic_params),
            args.len()
        );
        let mut extra = Vec::with_capacity(args.len() + 2);
        extra.push(decl.raw());
        extra.push(args.len() as u32);
        extra.extend(args.iter().map(|a| a.raw()));
        self.intern_complex(Tag::Opaque, &extra)
    }

    /// `any P & Q`. Protocols are sorted and deduplicated; an empty
    /// composition is `Idx::ANY`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn existential(&mut self, protocols: &[ProtocolId]) -> Idx {
        let mut sorted: Vec<ProtocolId> = protocols.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.is_empty() {
            return Idx::ANY;
        }

        let mut extra = Vec::with_capacity(sorted.len() + 1);
        extra.push(sorted.len() as u32);
        extra.extend(sorted.iter().map(|p| p.raw()));
        self.intern_complex(Tag::Existential, &extra)
    }

    /// The generic parameter at `depth`/`index`.
    pub fn generic_param(&mut self, depth: u16, index: u16) -> Idx {
        self.intern(Tag::GenericParam, GenericParamKey::new(depth, index).pack())
    }

    /// The type of a generic parameter key.
    pub fn param_type(&mut self, key: GenericParamKey) -> Idx {
        self.intern(Tag::GenericParam, key.pack())
    }
}
