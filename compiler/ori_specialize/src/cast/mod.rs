//! Static feasibility of dynamic casts.
//!
//! Classifies a (source, target) type pair into [`CastFeasibility`] using
//! only structural facts from the pool: identity, superclass chains (with
//! generic superclasses substituted), protocol conformance, and container
//! shape. Never inspects IR.

use rustc_hash::FxHashMap;

use ori_types::{DeclId, Idx, NominalKind, Pool, ProtocolId, Tag};

/// How a cast from one type to another can turn out.
///
/// Ordered from best to worst, so [`at_worst`](Self::at_worst) is `max`
/// and [`at_best`](Self::at_best) is `min`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CastFeasibility {
    WillSucceed,
    MaySucceed,
    WillFail,
}

impl CastFeasibility {
    /// The more pessimistic of the two.
    #[inline]
    #[must_use]
    pub fn at_worst(self, other: Self) -> Self {
        self.max(other)
    }

    /// The more optimistic of the two.
    #[inline]
    #[must_use]
    pub fn at_best(self, other: Self) -> Self {
        self.min(other)
    }
}

/// Cast classifier with a per-query-tuple cache.
pub struct CastClassifier<'pool> {
    pool: &'pool mut Pool,
    whole_module: bool,
    cache: FxHashMap<(Idx, Idx, bool), CastFeasibility>,
}

impl<'pool> CastClassifier<'pool> {
    pub fn new(pool: &'pool mut Pool, whole_module: bool) -> Self {
        Self {
            pool,
            whole_module,
            cache: FxHashMap::default(),
        }
    }

    /// Classify a cast of a value of type `source` to `target`.
    ///
    /// `exact` means the dynamic type of the source is known to be exactly
    /// `source` (no subclass).
    pub fn classify(&mut self, source: Idx, target: Idx, exact: bool) -> CastFeasibility {
        if let Some(&cached) = self.cache.get(&(source, target, exact)) {
            return cached;
        }
        let mut result = self.classify_uncached(source, target, exact);
        // Unbound parts may still line up after substitution.
        if result == CastFeasibility::WillFail && (self.is_unbound(source) || self.is_unbound(target)) {
            result = CastFeasibility::MaySucceed;
        }
        self.cache.insert((source, target, exact), result);
        result
    }

    fn is_unbound(&self, ty: Idx) -> bool {
        let flags = self.pool.flags(ty);
        flags.has_type_params() || flags.has_opaque()
    }

    fn classify_uncached(&mut self, source: Idx, target: Idx, exact: bool) -> CastFeasibility {
        if source == target || target == Idx::ANY {
            return CastFeasibility::WillSucceed;
        }
        let (src_tag, tgt_tag) = (self.pool.tag(source), self.pool.tag(target));

        // ── Containers ──────────────────────────────────────────
        match (src_tag, tgt_tag) {
            (Tag::Optional, Tag::Optional) => {
                let (a, b) = (self.pool.child(source), self.pool.child(target));
                // `nil` always casts.
                return self
                    .classify(a, b, exact)
                    .at_best(CastFeasibility::MaySucceed);
            }
            (Tag::Optional, _) => {
                let payload = self.pool.child(source);
                return self
                    .classify(payload, target, exact)
                    .at_worst(CastFeasibility::MaySucceed);
            }
            (_, Tag::Optional) => {
                let payload = self.pool.child(target);
                return self.classify(source, payload, exact);
            }
            (Tag::Tuple, Tag::Tuple) => {
                let (a, b) = (self.pool.tuple_elems(source), self.pool.tuple_elems(target));
                if a.len() != b.len() {
                    return CastFeasibility::WillFail;
                }
                return a
                    .iter()
                    .zip(&b)
                    .fold(CastFeasibility::WillSucceed, |acc, (&x, &y)| {
                        acc.at_worst(self.classify(x, y, exact))
                    });
            }
            (Tag::Metatype, Tag::Metatype) => {
                let (a, b) = (self.pool.child(source), self.pool.child(target));
                return self.classify(a, b, exact);
            }
            _ => {}
        }

        // ── Unbound types ───────────────────────────────────────
        if matches!(src_tag, Tag::GenericParam | Tag::Opaque)
            || matches!(tgt_tag, Tag::GenericParam | Tag::Opaque)
        {
            return CastFeasibility::MaySucceed;
        }

        // ── Existentials ────────────────────────────────────────
        if tgt_tag == Tag::Existential {
            return self.to_existential(source, target, exact);
        }
        if self.pool.is_existential(source) {
            return self.from_existential(source, target);
        }

        // ── Concrete to concrete ────────────────────────────────
        match (src_tag, tgt_tag) {
            (Tag::Class, Tag::Class) => self.class_to_class(source, target, exact),
            (Tag::Class, Tag::NativeObject) => CastFeasibility::WillSucceed,
            (Tag::NativeObject, Tag::Class) => CastFeasibility::MaySucceed,
            // Distinct concrete value types, or the same declaration with
            // different arguments.
            _ => CastFeasibility::WillFail,
        }
    }

    fn class_to_class(&mut self, source: Idx, target: Idx, exact: bool) -> CastFeasibility {
        if self.superclass_chain(source).contains(&target) {
            return CastFeasibility::WillSucceed;
        }
        if self.superclass_chain(target).contains(&source) {
            // Downcast: only possible if the dynamic type may be a subclass.
            let decl = self.pool.nominal_decl(source);
            return if exact || self.pool.registry().nominal(decl).is_final {
                CastFeasibility::WillFail
            } else {
                CastFeasibility::MaySucceed
            };
        }
        CastFeasibility::WillFail
    }

    /// `ty` followed by its superclasses, generic arguments applied.
    fn superclass_chain(&mut self, ty: Idx) -> Vec<Idx> {
        let mut chain = vec![ty];
        let mut cur = ty;
        while let Some(sup) = self.pool.superclass(cur) {
            if chain.contains(&sup) {
                break;
            }
            chain.push(sup);
            cur = sup;
        }
        chain
    }

    fn to_existential(&mut self, source: Idx, target: Idx, exact: bool) -> CastFeasibility {
        let protocols = self.pool.existential_protocols(target);
        if protocols.iter().all(|&p| self.pool.conforms_to(source, p)) {
            return CastFeasibility::WillSucceed;
        }
        if self.pool.is_existential(source) {
            // The dynamic type may conform to more than the static one.
            return CastFeasibility::MaySucceed;
        }
        let class_bound = self.pool.is_class_bound_existential(target);
        match self.pool.tag(source) {
            Tag::Class => {
                let decl = self.pool.nominal_decl(source);
                if self.hierarchy_is_closed(decl, exact)
                    && !self.some_subclass_conforms(decl, &protocols)
                {
                    CastFeasibility::WillFail
                } else {
                    CastFeasibility::MaySucceed
                }
            }
            Tag::NativeObject if class_bound => CastFeasibility::MaySucceed,
            // Value types have no subtypes.
            _ => CastFeasibility::WillFail,
        }
    }

    fn from_existential(&mut self, source: Idx, target: Idx) -> CastFeasibility {
        if source == Idx::ANY {
            return CastFeasibility::MaySucceed;
        }
        let is_class_target = matches!(self.pool.tag(target), Tag::Class | Tag::NativeObject);
        if self.pool.is_class_bound_existential(source) && !is_class_target {
            return CastFeasibility::WillFail;
        }
        // The contained value conforms to every protocol of the existential.
        let protocols = self.pool.existential_protocols(source);
        let missing = protocols
            .iter()
            .any(|&p| !self.pool.conforms_to(target, p));
        if !missing {
            return CastFeasibility::MaySucceed;
        }
        match self.pool.tag(target) {
            Tag::Class => {
                let decl = self.pool.nominal_decl(target);
                if self.hierarchy_is_closed(decl, false)
                    && !self.some_subclass_conforms(decl, &protocols)
                {
                    CastFeasibility::WillFail
                } else {
                    CastFeasibility::MaySucceed
                }
            }
            Tag::NativeObject => CastFeasibility::MaySucceed,
            _ => CastFeasibility::WillFail,
        }
    }

    /// No unknown subclass of `decl` can exist.
    fn hierarchy_is_closed(&self, decl: DeclId, exact: bool) -> bool {
        exact || self.whole_module || self.pool.registry().nominal(decl).is_final
    }

    /// Some known strict subclass of `decl` conforms to all `protocols`.
    fn some_subclass_conforms(&self, decl: DeclId, protocols: &[ProtocolId]) -> bool {
        if self.pool.registry().nominal(decl).is_final {
            return false;
        }
        let count = self.pool.registry().nominal_count();
        (0..count).any(|i| {
            #[expect(clippy::cast_possible_truncation, reason = "declaration counts fit in u32")]
            let candidate = DeclId::new(i as u32);
            candidate != decl
                && self.pool.registry().nominal(candidate).kind == NominalKind::Class
                && self.inherits_from(candidate, decl)
                && protocols
                    .iter()
                    .all(|&p| self.pool.registry().nominal_conforms(candidate, p))
        })
    }

    /// Declaration-level superclass walk.
    fn inherits_from(&self, mut candidate: DeclId, ancestor: DeclId) -> bool {
        let registry = self.pool.registry();
        let mut steps = 0;
        while let Some(sup) = registry.nominal(candidate).superclass {
            candidate = self.pool.nominal_decl(sup);
            if candidate == ancestor {
                return true;
            }
            steps += 1;
            if steps > registry.nominal_count() {
                return false;
            }
        }
        false
    }
}

/// One-shot classification without a persistent cache.
pub fn classify(
    pool: &mut Pool,
    source: Idx,
    target: Idx,
    is_source_exact: bool,
    allow_whole_module: bool,
) -> CastFeasibility {
    CastClassifier::new(pool, allow_whole_module).classify(source, target, is_source_exact)
}
