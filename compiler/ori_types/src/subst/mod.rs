//! Generic signatures, conformances and substitution maps.
//!
//! A [`SubstitutionMap`] is kept in canonical form: its signature's
//! parameters and requirements are sorted, and conformances are stored
//! positionally against the sorted requirements. Two maps that bind the
//! same parameters to the same types with the same evidence are therefore
//! `==` and hash identically, which is what the specialization cache keys on.

use std::fmt;

use crate::registry::ProtocolId;
use crate::traverse::{super_fold, TypeFolder};
use crate::{Idx, Pool, Tag};

/// Position of a generic parameter: nesting depth and index within it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenericParamKey {
    pub depth: u16,
    pub index: u16,
}

impl GenericParamKey {
    #[inline]
    pub const fn new(depth: u16, index: u16) -> Self {
        Self { depth, index }
    }

    #[inline]
    pub(crate) const fn pack(self) -> u32 {
        (self.depth as u32) << 16 | self.index as u32
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) const fn unpack(raw: u32) -> Self {
        Self {
            depth: (raw >> 16) as u16,
            index: raw as u16,
        }
    }
}

impl fmt::Display for GenericParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "τ_{}_{}", self.depth, self.index)
    }
}

/// `param: protocol`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Requirement {
    pub param: GenericParamKey,
    pub protocol: ProtocolId,
}

/// Generic parameters and conformance requirements of a declaration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct GenericSignature {
    params: Vec<GenericParamKey>,
    requirements: Vec<Requirement>,
}

impl GenericSignature {
    /// Build a signature; parameters and requirements are sorted and
    /// deduplicated.
    pub fn new(
        params: impl IntoIterator<Item = GenericParamKey>,
        requirements: impl IntoIterator<Item = Requirement>,
    ) -> Self {
        let mut params: Vec<_> = params.into_iter().collect();
        params.sort_unstable();
        params.dedup();
        let mut requirements: Vec<_> = requirements.into_iter().collect();
        requirements.sort_unstable();
        requirements.dedup();
        debug_assert!(
            requirements
                .iter()
                .all(|r| params.binary_search(&r.param).is_ok()),
            "requirement on a parameter outside the signature"
        );
        Self {
            params,
            requirements,
        }
    }

    /// `count` unconstrained parameters at depth 0.
    pub fn with_params(count: u16) -> Self {
        Self::new((0..count).map(|i| GenericParamKey::new(0, i)), [])
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    #[inline]
    pub fn params(&self) -> &[GenericParamKey] {
        &self.params
    }

    #[inline]
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    fn position(&self, key: GenericParamKey) -> Option<usize> {
        self.params.binary_search(&key).ok()
    }
}

/// Evidence that a type conforms to a protocol.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Conformance {
    /// Provided by a requirement of an enclosing generic signature.
    Abstract { ty: Idx, protocol: ProtocolId },
    /// A concrete conformance declaration.
    Concrete { ty: Idx, protocol: ProtocolId },
    /// The type does not conform.
    Invalid { ty: Idx, protocol: ProtocolId },
}

impl Conformance {
    #[inline]
    pub fn ty(&self) -> Idx {
        match *self {
            Self::Abstract { ty, .. } | Self::Concrete { ty, .. } | Self::Invalid { ty, .. } => ty,
        }
    }

    #[inline]
    pub fn protocol(&self) -> ProtocolId {
        match *self {
            Self::Abstract { protocol, .. }
            | Self::Concrete { protocol, .. }
            | Self::Invalid { protocol, .. } => protocol,
        }
    }

    #[inline]
    pub fn is_concrete(&self) -> bool {
        matches!(self, Self::Concrete { .. })
    }

    #[inline]
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }
}

/// Replacement types and conformance evidence for a generic signature.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SubstitutionMap {
    signature: GenericSignature,
    replacements: Vec<Idx>,
    conformances: Vec<Conformance>,
}

impl SubstitutionMap {
    /// The map for a non-generic context.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a map from replacements (ordered like `signature.params()`) and
    /// conformances (ordered like `signature.requirements()`).
    ///
    /// # Panics
    /// Panics if either list has the wrong length.
    pub fn new(
        signature: GenericSignature,
        replacements: Vec<Idx>,
        conformances: Vec<Conformance>,
    ) -> Self {
        assert_eq!(
            signature.params().len(),
            replacements.len(),
            "substitution map needs one replacement per generic parameter"
        );
        assert_eq!(
            signature.requirements().len(),
            conformances.len(),
            "substitution map needs one conformance per requirement"
        );
        Self {
            signature,
            replacements,
            conformances,
        }
    }

    /// Build a map, looking up conformance evidence in the pool.
    pub fn from_replacements(pool: &Pool, signature: GenericSignature, replacements: Vec<Idx>) -> Self {
        let conformances = signature
            .requirements()
            .iter()
            .map(|req| {
                let pos = signature.position(req.param).unwrap_or_else(|| {
                    panic!("requirement on {} outside the signature", req.param)
                });
                pool.conformance_for(replacements[pos], req.protocol)
            })
            .collect();
        Self::new(signature, replacements, conformances)
    }

    /// The map sending every parameter of `signature` to itself.
    pub fn forwarding(pool: &mut Pool, signature: &GenericSignature) -> Self {
        let replacements = signature
            .params()
            .iter()
            .map(|&key| pool.param_type(key))
            .collect::<Vec<_>>();
        let conformances = signature
            .requirements()
            .iter()
            .map(|req| Conformance::Abstract {
                ty: pool.param_type(req.param),
                protocol: req.protocol,
            })
            .collect();
        Self::new(signature.clone(), replacements, conformances)
    }

    #[inline]
    pub fn signature(&self) -> &GenericSignature {
        &self.signature
    }

    #[inline]
    pub fn replacements(&self) -> &[Idx] {
        &self.replacements
    }

    #[inline]
    pub fn conformances(&self) -> &[Conformance] {
        &self.conformances
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.signature.is_empty()
    }

    pub fn replacement(&self, key: GenericParamKey) -> Option<Idx> {
        self.signature.position(key).map(|i| self.replacements[i])
    }

    pub fn lookup_conformance(
        &self,
        key: GenericParamKey,
        protocol: ProtocolId,
    ) -> Option<&Conformance> {
        self.signature
            .requirements()
            .binary_search(&Requirement {
                param: key,
                protocol,
            })
            .ok()
            .map(|i| &self.conformances[i])
    }

    /// Every parameter maps to itself.
    pub fn is_identity(&self, pool: &Pool) -> bool {
        self.signature
            .params()
            .iter()
            .zip(&self.replacements)
            .all(|(&key, &ty)| {
                pool.tag(ty) == Tag::GenericParam && pool.generic_param_key(ty) == key
            })
    }

    /// Some replacement still mentions a generic parameter.
    pub fn has_type_params(&self, pool: &Pool) -> bool {
        self.replacements
            .iter()
            .any(|&ty| pool.flags(ty).has_type_params())
    }

    /// Some replacement mentions an opaque result type.
    pub fn has_opaque(&self, pool: &Pool) -> bool {
        self.replacements.iter().any(|&ty| pool.flags(ty).has_opaque())
    }

    /// Compose: apply `outer` to every replacement and conformance.
    #[must_use]
    pub fn subst(&self, pool: &mut Pool, outer: &SubstitutionMap) -> SubstitutionMap {
        let replacements = self
            .replacements
            .iter()
            .map(|&ty| pool.subst(ty, outer))
            .collect();
        let conformances = self
            .conformances
            .iter()
            .map(|c| pool.subst_conformance(c, outer))
            .collect();
        Self::new(self.signature.clone(), replacements, conformances)
    }

    /// Render replacements for diagnostics.
    pub fn display(&self, pool: &Pool) -> String {
        let parts: Vec<String> = self
            .signature
            .params()
            .iter()
            .zip(&self.replacements)
            .map(|(k, &ty)| format!("{k} := {}", pool.format_type(ty)))
            .collect();
        format!("[{}]", parts.join(", "))
    }
}

/// Replaces generic parameters bound by a substitution map.
struct Substituter<'a> {
    map: &'a SubstitutionMap,
}

impl TypeFolder for Substituter<'_> {
    fn skip(&self, pool: &Pool, ty: Idx) -> bool {
        !pool.flags(ty).needs_subst()
    }

    fn fold_generic_param(&mut self, _pool: &mut Pool, ty: Idx, key: GenericParamKey) -> Idx {
        self.map.replacement(key).unwrap_or(ty)
    }
}

/// Replaces depth-0 parameters with positional arguments.
struct ArgApplier<'a> {
    args: &'a [Idx],
}

impl TypeFolder for ArgApplier<'_> {
    fn skip(&self, pool: &Pool, ty: Idx) -> bool {
        !pool.flags(ty).needs_subst()
    }

    fn fold_generic_param(&mut self, _pool: &mut Pool, ty: Idx, key: GenericParamKey) -> Idx {
        if key.depth == 0 {
            self.args.get(usize::from(key.index)).copied().unwrap_or(ty)
        } else {
            ty
        }
    }
}

impl Pool {
    /// Apply a substitution map. Types without generic parameters are
    /// returned unchanged without traversal.
    pub fn subst(&mut self, ty: Idx, map: &SubstitutionMap) -> Idx {
        if map.is_empty() || !self.flags(ty).needs_subst() {
            return ty;
        }
        super_fold(&mut Substituter { map }, self, ty)
    }

    /// Instantiate a declaration-relative type with positional generic
    /// arguments.
    pub fn apply_generic_args(&mut self, ty: Idx, args: &[Idx]) -> Idx {
        if args.is_empty() || !self.flags(ty).needs_subst() {
            return ty;
        }
        super_fold(&mut ArgApplier { args }, self, ty)
    }

    /// Evidence that `ty` conforms to `protocol`, as far as the pool knows.
    pub fn conformance_for(&self, ty: Idx, protocol: ProtocolId) -> Conformance {
        if matches!(self.tag(ty), Tag::GenericParam | Tag::Opaque) {
            Conformance::Abstract { ty, protocol }
        } else if self.conforms_to(ty, protocol) {
            Conformance::Concrete { ty, protocol }
        } else {
            Conformance::Invalid { ty, protocol }
        }
    }

    /// Apply a substitution map to conformance evidence.
    pub fn subst_conformance(&mut self, conf: &Conformance, map: &SubstitutionMap) -> Conformance {
        match *conf {
            Conformance::Abstract { ty, protocol } if self.tag(ty) == Tag::GenericParam => {
                let key = self.generic_param_key(ty);
                if let Some(found) = map.lookup_conformance(key, protocol) {
                    return found.clone();
                }
                match map.replacement(key) {
                    Some(replacement) => self.conformance_for(replacement, protocol),
                    None => conf.clone(),
                }
            }
            Conformance::Abstract { ty, protocol } => {
                let ty = self.subst(ty, map);
                self.conformance_for(ty, protocol)
            }
            Conformance::Concrete { ty, protocol } => Conformance::Concrete {
                ty: self.subst(ty, map),
                protocol,
            },
            Conformance::Invalid { .. } => conf.clone(),
        }
    }
}
