//! Declarations referenced by nominal, opaque and existential types.
//!
//! The registry is owned by the [`Pool`](crate::Pool). Types store only the
//! raw id of their declaration; everything else (fields, superclass,
//! resilience, conformances) is looked up here.

use rustc_hash::FxHashMap;

use crate::Idx;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
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

            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_id!(
    /// A struct, enum or class declaration.
    DeclId
);
define_id!(
    /// A protocol declaration.
    ProtocolId
);
define_id!(
    /// An opaque result type declaration.
    OpaqueId
);
define_id!(
    /// The module a declaration or function belongs to.
    ModuleId
);

impl ModuleId {
    /// The module being compiled.
    pub const MAIN: Self = Self(0);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NominalKind {
    Struct,
    Enum,
    Class,
}

/// A struct, enum or class declaration.
///
/// `fields` are written in terms of the declaration's own generic
/// parameters (depth 0). For enums they are the payload types of all cases.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NominalDecl {
    pub name: String,
    pub kind: NominalKind,
    pub module: ModuleId,
    pub generic_params: u16,
    pub fields: Vec<Idx>,
    pub superclass: Option<Idx>,
    /// No subclasses can exist.
    pub is_final: bool,
    /// Subclasses may exist outside the defining module.
    pub is_open: bool,
    /// Layout may change without recompiling clients.
    pub resilient: bool,
    pub is_public: bool,
    pub conformances: Vec<ProtocolId>,
}

impl NominalDecl {
    pub fn new(name: impl Into<String>, kind: NominalKind, module: ModuleId) -> Self {
        Self {
            name: name.into(),
            kind,
            module,
            generic_params: 0,
            fields: Vec::new(),
            superclass: None,
            is_final: false,
            is_open: false,
            resilient: false,
            is_public: false,
            conformances: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_generic_params(mut self, count: u16) -> Self {
        self.generic_params = count;
        self
    }

    #[must_use]
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = Idx>) -> Self {
        self.fields = fields.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_superclass(mut self, superclass: Idx) -> Self {
        self.superclass = Some(superclass);
        self
    }

    #[must_use]
    pub fn conforming_to(mut self, protocols: impl IntoIterator<Item = ProtocolId>) -> Self {
        self.conformances.extend(protocols);
        self
    }

    #[must_use]
    pub fn final_(mut self) -> Self {
        self.is_final = true;
        self
    }

    #[must_use]
    pub fn open(mut self) -> Self {
        self.is_open = true;
        self.is_public = true;
        self
    }

    #[must_use]
    pub fn public(mut self) -> Self {
        self.is_public = true;
        self
    }

    #[must_use]
    pub fn resilient(mut self) -> Self {
        self.resilient = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolDecl {
    pub name: String,
    /// Only class types may conform.
    pub class_bound: bool,
    pub inherited: Vec<ProtocolId>,
}

impl ProtocolDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_bound: false,
            inherited: Vec::new(),
        }
    }

    #[must_use]
    pub fn class_bound(mut self) -> Self {
        self.class_bound = true;
        self
    }

    #[must_use]
    pub fn inheriting(mut self, parents: impl IntoIterator<Item = ProtocolId>) -> Self {
        self.inherited.extend(parents);
        self
    }
}

/// An opaque result type: `some P` returned by a declaration.
///
/// `underlying` is written in terms of the opaque's own generic parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpaqueDecl {
    pub name: String,
    pub module: ModuleId,
    pub generic_params: u16,
    pub underlying: Option<Idx>,
    pub constraints: Vec<ProtocolId>,
}

impl OpaqueDecl {
    pub fn new(name: impl Into<String>, module: ModuleId) -> Self {
        Self {
            name: name.into(),
            module,
            generic_params: 0,
            underlying: None,
            constraints: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_generic_params(mut self, count: u16) -> Self {
        self.generic_params = count;
        self
    }

    #[must_use]
    pub fn with_underlying(mut self, ty: Idx) -> Self {
        self.underlying = Some(ty);
        self
    }

    #[must_use]
    pub fn constrained_to(mut self, protocols: impl IntoIterator<Item = ProtocolId>) -> Self {
        self.constraints.extend(protocols);
        self
    }
}

/// Storage for all declarations known to a pool.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    nominals: Vec<NominalDecl>,
    protocols: Vec<ProtocolDecl>,
    opaques: Vec<OpaqueDecl>,
    /// Conformances of non-nominal types (primitives, tuples, ...).
    builtin_conformances: FxHashMap<Idx, Vec<ProtocolId>>,
}

impl Registry {
    #[allow(clippy::cast_possible_truncation)]
    pub fn add_nominal(&mut self, decl: NominalDecl) -> DeclId {
        let id = DeclId::new(self.nominals.len() as u32);
        self.nominals.push(decl);
        id
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn add_protocol(&mut self, decl: ProtocolDecl) -> ProtocolId {
        let id = ProtocolId::new(self.protocols.len() as u32);
        self.protocols.push(decl);
        id
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn add_opaque(&mut self, decl: OpaqueDecl) -> OpaqueId {
        let id = OpaqueId::new(self.opaques.len() as u32);
        self.opaques.push(decl);
        id
    }

    pub fn add_builtin_conformance(&mut self, ty: Idx, protocol: ProtocolId) {
        let list = self.builtin_conformances.entry(ty).or_default();
        if !list.contains(&protocol) {
            list.push(protocol);
        }
    }

    /// # Panics
    /// Panics if `id` was not issued by this registry.
    #[inline]
    pub fn nominal(&self, id: DeclId) -> &NominalDecl {
        &self.nominals[id.index()]
    }

    /// Mutable access, used to fill in fields after the declaration's own
    /// type has been interned (recursive types).
    #[inline]
    pub fn nominal_mut(&mut self, id: DeclId) -> &mut NominalDecl {
        &mut self.nominals[id.index()]
    }

    #[inline]
    pub fn protocol(&self, id: ProtocolId) -> &ProtocolDecl {
        &self.protocols[id.index()]
    }

    #[inline]
    pub fn opaque(&self, id: OpaqueId) -> &OpaqueDecl {
        &self.opaques[id.index()]
    }

    #[inline]
    pub fn opaque_mut(&mut self, id: OpaqueId) -> &mut OpaqueDecl {
        &mut self.opaques[id.index()]
    }

    /// Whether conforming to `derived` implies conforming to `base`.
    pub fn protocol_implies(&self, derived: ProtocolId, base: ProtocolId) -> bool {
        let mut stack = vec![derived];
        let mut seen = Vec::new();
        while let Some(p) = stack.pop() {
            if p == base {
                return true;
            }
            if seen.contains(&p) {
                continue;
            }
            seen.push(p);
            stack.extend(self.protocol(p).inherited.iter().copied());
        }
        false
    }

    /// A protocol is class-bound if it or any protocol it inherits is.
    pub fn is_class_bound(&self, protocol: ProtocolId) -> bool {
        let decl = self.protocol(protocol);
        decl.class_bound || decl.inherited.iter().any(|&p| self.is_class_bound(p))
    }

    /// Check declared conformances of a nominal, following protocol
    /// inheritance.
    pub fn nominal_conforms(&self, decl: DeclId, protocol: ProtocolId) -> bool {
        self.nominal(decl)
            .conformances
            .iter()
            .any(|&p| self.protocol_implies(p, protocol))
    }

    pub fn builtin_conforms(&self, ty: Idx, protocol: ProtocolId) -> bool {
        self.builtin_conformances
            .get(&ty)
            .is_some_and(|list| list.iter().any(|&p| self.protocol_implies(p, protocol)))
    }

    /// Number of nominal declarations.
    pub fn nominal_count(&self) -> usize {
        self.nominals.len()
    }
}
