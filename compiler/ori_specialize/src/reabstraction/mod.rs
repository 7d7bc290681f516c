//! Calling-convention planning for a specialization.
//!
//! Generic code passes values of generic type indirectly. Once a
//! substitution makes such a type loadable, the specialized function can
//! take (or return) it directly instead. A [`ReabstractionPlan`] records,
//! per formal parameter and result, whether that conversion happens, and
//! whether the specialization is possible at all. Building a plan never
//! touches IR.

use smallvec::SmallVec;

use ori_ssa::{
    FuncId, Function, ParamConvention, ResultConvention, SilFunctionType, SilParam, SilResult,
};
use ori_types::{Idx, Pool, SubstitutionMap, Tag, TypeLowering};

use crate::error::Rejection;

/// Conversion plan for specializing one function with one substitution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReabstractionPlan {
    original: FuncId,
    subs: SubstitutionMap,
    serialized: bool,
    /// The original signature with `subs` applied, conventions unchanged.
    substituted: SilFunctionType,
    specialized: SilFunctionType,
    converted_params: SmallVec<[bool; 8]>,
    converted_results: SmallVec<[bool; 4]>,
    rejection: Option<Rejection>,
}

impl ReabstractionPlan {
    /// Plan the specialization of `callee` (whose id is `original`) under
    /// `subs`. `lowering` must be set up for the module the specialization
    /// will live in.
    pub fn new(
        pool: &mut Pool,
        lowering: &mut TypeLowering,
        original: FuncId,
        callee: &Function,
        subs: SubstitutionMap,
        serialized: bool,
    ) -> Self {
        let generic = &callee.ty;
        let mut plan = Self {
            original,
            serialized,
            substituted: SilFunctionType::default(),
            specialized: SilFunctionType::default(),
            converted_params: SmallVec::new(),
            converted_results: SmallVec::new(),
            rejection: None,
            subs,
        };
        if let Err(rejection) = plan.check_substitution(pool, callee) {
            plan.rejection = Some(rejection);
            plan.substituted = generic.clone();
            plan.specialized = generic.clone();
            return plan;
        }

        let substituted = generic.substituted(pool, &plan.subs);
        let substituted = lower_signature(pool, lowering, &substituted);
        let mut specialized = substituted.clone();
        // Parameters outside the callee's own signature survive substitution.
        let mut rejection = substituted
            .has_type_params(pool)
            .then(|| Rejection::UnresolvedSubstitution {
                callee: callee.name.clone(),
                subs: plan.subs.display(pool),
            });

        for (param, slot) in substituted.params.iter().zip(&mut specialized.params) {
            let (converted, convention) = plan_param(pool, lowering, param);
            if !param.convention.is_indirect() && lowering.is_address_only(pool, param.ty) {
                rejection.get_or_insert_with(|| boxing(pool, callee, param.ty));
            }
            slot.convention = convention;
            plan.converted_params.push(converted);
        }
        for (result, slot) in substituted.results.iter().zip(&mut specialized.results) {
            let converted = result.convention.is_indirect() && lowering.is_loadable(pool, result.ty);
            if converted {
                slot.convention = if lowering.is_trivial(pool, result.ty) {
                    ResultConvention::Unowned
                } else {
                    ResultConvention::Owned
                };
            } else if !result.convention.is_indirect() && lowering.is_address_only(pool, result.ty) {
                rejection.get_or_insert_with(|| boxing(pool, callee, result.ty));
            }
            plan.converted_results.push(converted);
        }

        if serialized && rejection.is_none() {
            rejection = signature_types(&substituted)
                .find_map(|ty| first_private_type(pool, ty))
                .map(|ty| Rejection::NotSerializable {
                    callee: callee.name.clone(),
                    ty: pool.format_type(ty),
                });
        }

        tracing::trace!(
            callee = %callee.name,
            params = ?plan.converted_params,
            results = ?plan.converted_results,
            rejected = rejection.is_some(),
            "reabstraction plan"
        );
        plan.substituted = substituted;
        plan.specialized = specialized;
        plan.rejection = rejection;
        plan
    }

    fn check_substitution(&self, pool: &Pool, callee: &Function) -> Result<(), Rejection> {
        let sig = &callee.ty.generic_sig;
        if sig.is_empty() {
            return Err(Rejection::NotGeneric {
                callee: callee.name.clone(),
            });
        }
        if self.subs.signature() != sig {
            return Err(Rejection::SignatureMismatch {
                callee: callee.name.clone(),
            });
        }
        if self.subs.has_type_params(pool) {
            return Err(Rejection::UnresolvedSubstitution {
                callee: callee.name.clone(),
                subs: self.subs.display(pool),
            });
        }
        if let Some(bad) = self.subs.conformances().iter().find(|c| c.is_invalid()) {
            return Err(Rejection::MissingConformance {
                callee: callee.name.clone(),
                ty: pool.format_type(bad.ty()),
            });
        }
        Ok(())
    }

    pub fn can_be_specialized(&self) -> bool {
        self.rejection.is_none()
    }

    /// Why the specialization is impossible, if it is.
    pub fn check(&self) -> Result<(), Rejection> {
        match &self.rejection {
            Some(rejection) => Err(rejection.clone()),
            None => Ok(()),
        }
    }

    /// The concrete signature of the specialized function.
    pub fn create_specialized_type(&self) -> SilFunctionType {
        self.specialized.clone()
    }

    #[inline]
    pub fn original(&self) -> FuncId {
        self.original
    }

    #[inline]
    pub fn subs(&self) -> &SubstitutionMap {
        &self.subs
    }

    #[inline]
    pub fn is_serialized(&self) -> bool {
        self.serialized
    }

    pub fn substituted_type(&self) -> &SilFunctionType {
        &self.substituted
    }

    pub fn specialized_type(&self) -> &SilFunctionType {
        &self.specialized
    }

    /// Whether formal parameter `index` moves from indirect to direct.
    pub fn is_param_converted(&self, index: usize) -> bool {
        self.converted_params.get(index).copied().unwrap_or(false)
    }

    /// Whether formal result `index` moves from indirect to direct.
    pub fn is_result_converted(&self, index: usize) -> bool {
        self.converted_results.get(index).copied().unwrap_or(false)
    }

    pub fn num_converted_params(&self) -> usize {
        self.converted_params.iter().filter(|&&c| c).count()
    }

    pub fn num_converted_results(&self) -> usize {
        self.converted_results.iter().filter(|&&c| c).count()
    }

    pub fn has_conversions(&self) -> bool {
        self.converted_params.iter().chain(&self.converted_results).any(|&c| c)
    }
}

/// Whether the parameter converts, and its specialized convention.
fn plan_param(pool: &mut Pool, lowering: &mut TypeLowering, param: &SilParam) -> (bool, ParamConvention) {
    let direct = match param.convention {
        ParamConvention::IndirectIn => ParamConvention::DirectOwned,
        ParamConvention::IndirectInGuaranteed => ParamConvention::DirectGuaranteed,
        other => return (false, other),
    };
    if !lowering.is_loadable(pool, param.ty) {
        return (false, param.convention);
    }
    if lowering.is_trivial(pool, param.ty) {
        (true, ParamConvention::DirectUnowned)
    } else {
        (true, direct)
    }
}

/// Replace visible opaque types by their underlying types.
fn lower_signature(pool: &mut Pool, lowering: &mut TypeLowering, ty: &SilFunctionType) -> SilFunctionType {
    SilFunctionType {
        generic_sig: ty.generic_sig.clone(),
        params: ty
            .params
            .iter()
            .map(|p| SilParam::new(lowering.lower(pool, p.ty), p.convention))
            .collect(),
        results: ty
            .results
            .iter()
            .map(|r| SilResult::new(lowering.lower(pool, r.ty), r.convention))
            .collect(),
        error: ty.error.map(|e| lowering.lower(pool, e)),
    }
}

fn signature_types(ty: &SilFunctionType) -> impl Iterator<Item = Idx> + '_ {
    ty.params
        .iter()
        .map(|p| p.ty)
        .chain(ty.results.iter().map(|r| r.ty))
        .chain(ty.error)
}

fn boxing(pool: &Pool, callee: &Function, ty: Idx) -> Rejection {
    Rejection::RequiresBoxing {
        callee: callee.name.clone(),
        ty: pool.format_type(ty),
    }
}

/// The first nominal type inside `ty` that is not public.
fn first_private_type(pool: &Pool, ty: Idx) -> Option<Idx> {
    match pool.tag(ty) {
        Tag::Address | Tag::Metatype | Tag::Optional => first_private_type(pool, pool.child(ty)),
        Tag::Tuple => pool
            .tuple_elems(ty)
            .into_iter()
            .find_map(|t| first_private_type(pool, t)),
        Tag::Function => pool
            .function_params(ty)
            .into_iter()
            .chain(std::iter::once(pool.function_return(ty)))
            .find_map(|t| first_private_type(pool, t)),
        Tag::Struct | Tag::Enum | Tag::Class => {
            if !pool.registry().nominal(pool.nominal_decl(ty)).is_public {
                return Some(ty);
            }
            pool.generic_args(ty)
                .into_iter()
                .find_map(|t| first_private_type(pool, t))
        }
        Tag::Opaque => pool
            .generic_args(ty)
            .into_iter()
            .find_map(|t| first_private_type(pool, t)),
        _ => None,
    }
}
