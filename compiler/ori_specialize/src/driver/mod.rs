//! Generic call-site specialization.
//!
//! [`GenericSpecializer::specialize_call`] takes one `apply`, `try_apply`
//! or `partial_apply` of a generic function with a concrete substitution
//! through five steps:
//!
//! 1. Plan the reabstraction; reject infeasible substitutions.
//! 2. Mangle a canonical name and look it up in the cache, then in the
//!    module's function table.
//! 3. On a miss, declare the specialization, register its name, and clone
//!    the original body under the substitution.
//! 4. Rewrite the call site to call the specialization directly.
//! 5. Record the new function for the caller's worklist.
//!
//! The name is registered before the body is cloned, so a self-recursive
//! generic function resolves its own recursive call to the function being
//! built instead of specializing again.

use std::fmt;

use ori_ssa::{
    verify_function, BlockId, FuncId, Function, FunctionBuilder, FunctionNotifier, InstId,
    InstKind, Linkage, Module, ParamConvention, SilFunctionType, SpecializationInfo, ValueId,
};
use ori_types::{LoweringContext, ModuleId, SubstitutionMap, TypeLowering};

use crate::cache::SpecializationContext;
use crate::config::SpecializeConfig;
use crate::error::Rejection;
use crate::mangle::{DefaultMangler, Mangler};
use crate::reabstraction::ReabstractionPlan;
use crate::subst_cloner::{clone_specialized_body, inlined_scope_roots};

// ── States ──────────────────────────────────────────────────────────

/// Progress of one call site, reported through `tracing`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Requested,
    Rejected,
    CacheHit,
    Reused,
    CacheMiss,
    Cloning,
    Populated,
    CallSiteRewritten,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Requested => "requested",
            Self::Rejected => "rejected",
            Self::CacheHit => "cache-hit",
            Self::Reused => "reused",
            Self::CacheMiss => "cache-miss",
            Self::Cloning => "cloning",
            Self::Populated => "populated",
            Self::CallSiteRewritten => "call-site-rewritten",
        })
    }
}

fn transition(state: State, subject: &str) {
    tracing::debug!(%state, subject, "specialize");
}

// ── Call sites ──────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SiteKind {
    Apply,
    PartialApply,
    TryApply { normal: BlockId, error: BlockId },
}

#[derive(Clone, Debug)]
struct CallSite {
    kind: SiteKind,
    callee: ValueId,
    subs: SubstitutionMap,
    args: Vec<ValueId>,
}

impl CallSite {
    fn decode(func: &Function, inst: InstId) -> Option<Self> {
        let (kind, callee, subs, args) = match func.kind(inst) {
            InstKind::Apply { callee, subs, args } => (SiteKind::Apply, callee, subs, args),
            InstKind::PartialApply { callee, subs, args } => {
                (SiteKind::PartialApply, callee, subs, args)
            }
            InstKind::TryApply {
                callee,
                subs,
                args,
                normal,
                error,
            } => (
                SiteKind::TryApply {
                    normal: *normal,
                    error: *error,
                },
                callee,
                subs,
                args,
            ),
            _ => return None,
        };
        Some(Self {
            kind,
            callee: *callee,
            subs: subs.clone(),
            args: args.clone(),
        })
    }

    /// The function a direct callee refers to.
    fn target(&self, func: &Function) -> Option<FuncId> {
        let def = func.defining_inst(self.callee)?;
        match func.kind(def) {
            InstKind::FunctionRef { func } => Some(*func),
            _ => None,
        }
    }
}

// ── Specializer ─────────────────────────────────────────────────────

/// Specializes generic call sites, sharing results through a
/// [`SpecializationContext`].
pub struct GenericSpecializer<M: Mangler = DefaultMangler> {
    config: SpecializeConfig,
    mangler: M,
}

impl GenericSpecializer {
    pub fn new(config: SpecializeConfig) -> Self {
        Self::with_mangler(config, DefaultMangler)
    }
}

impl<M: Mangler> GenericSpecializer<M> {
    pub fn with_mangler(config: SpecializeConfig, mangler: M) -> Self {
        Self { config, mangler }
    }

    pub fn config(&self) -> &SpecializeConfig {
        &self.config
    }

    /// Specialize the call site `inst` in `caller`.
    ///
    /// On success the call site now calls the returned function with an
    /// empty substitution. On rejection the call site is untouched.
    ///
    /// # Panics
    /// Panics if `inst` is not an apply site, or if verification is enabled
    /// and a freshly cloned body fails it.
    pub fn specialize_call(
        &self,
        module: &mut Module,
        cx: &mut SpecializationContext,
        caller: FuncId,
        inst: InstId,
        notifier: &mut dyn FunctionNotifier,
    ) -> Result<FuncId, Rejection> {
        tracing::debug!(
            state = %State::Requested,
            caller = %module.functions.get(caller).name,
            %inst,
            "specialize"
        );
        let result = self.try_specialize(module, cx, caller, inst, notifier);
        if let Err(rejection) = &result {
            cx.stats.rejected += 1;
            transition(State::Rejected, &rejection.to_string());
        }
        result
    }

    /// Specialize every eligible call site of `caller` in layout order.
    /// Returns the number of call sites rewritten.
    pub fn specialize_calls_in(
        &self,
        module: &mut Module,
        cx: &mut SpecializationContext,
        caller: FuncId,
        notifier: &mut dyn FunctionNotifier,
    ) -> usize {
        let func = module.functions.get(caller);
        let sites: Vec<InstId> = func
            .insts_in_layout_order()
            .into_iter()
            .filter(|&i| self.is_candidate(func.kind(i)))
            .collect();
        let candidates = sites.len();
        let rewritten = sites
            .into_iter()
            .filter(|&inst| {
                self.specialize_call(module, cx, caller, inst, notifier)
                    .is_ok()
            })
            .count();
        tracing::debug!(
            caller = %module.functions.get(caller).name,
            candidates,
            rewritten,
            "specialized call sites"
        );
        rewritten
    }

    fn is_candidate(&self, kind: &InstKind) -> bool {
        match kind {
            InstKind::Apply { subs, .. } | InstKind::TryApply { subs, .. } => !subs.is_empty(),
            InstKind::PartialApply { subs, .. } => {
                self.config.specialize_partial_apply && !subs.is_empty()
            }
            _ => false,
        }
    }

    fn try_specialize(
        &self,
        module: &mut Module,
        cx: &mut SpecializationContext,
        caller: FuncId,
        inst: InstId,
        notifier: &mut dyn FunctionNotifier,
    ) -> Result<FuncId, Rejection> {
        let caller_fn = module.functions.get(caller);
        let site = CallSite::decode(caller_fn, inst).unwrap_or_else(|| {
            panic!(
                "{inst} in `{}` is {}, not an apply site",
                caller_fn.name,
                caller_fn.kind(inst).name()
            )
        });
        let original = site.target(caller_fn).ok_or_else(|| Rejection::IndirectCallee {
            site: format!("{inst} in `{}`", caller_fn.name),
        })?;
        let callee = module.functions.get(original);
        if site.subs.has_type_params(&module.pool) {
            return Err(Rejection::UnresolvedSubstitution {
                callee: callee.name.clone(),
                subs: site.subs.display(&module.pool),
            });
        }

        let home = caller_fn.module;
        let serialized = caller_fn.serialized && callee.serialized;
        let ctx = LoweringContext::new(home)
            .whole_module(self.config.whole_module)
            .serialized(serialized);
        let mut lowering = TypeLowering::new(ctx);
        let plan = ReabstractionPlan::new(
            &mut module.pool,
            &mut lowering,
            original,
            callee,
            site.subs.clone(),
            serialized,
        );
        plan.check()?;
        if site.kind == SiteKind::PartialApply && plan.has_conversions() {
            return Err(Rejection::RequiresThunk {
                callee: callee.name.clone(),
            });
        }

        let name = self
            .mangler
            .mangle(&module.pool, &callee.name, plan.subs(), serialized);
        let existing = cx
            .cache
            .get(&name)
            .or_else(|| module.functions.lookup(&name));
        let specialized = match existing {
            Some(id) if !module.functions.get(id).is_declaration() => {
                transition(State::CacheHit, &name);
                cx.cache.insert(name.as_str(), id);
                cx.stats.reused += 1;
                transition(State::Reused, &name);
                id
            }
            placeholder => {
                if callee.is_declaration() {
                    return Err(Rejection::CalleeHasNoBody {
                        callee: callee.name.clone(),
                    });
                }
                transition(State::CacheMiss, &name);
                self.create(module, cx, &plan, name, placeholder, home, notifier)
            }
        };

        rewrite_call_site(module, caller, inst, &site, &plan, specialized);
        transition(State::CallSiteRewritten, &module.functions.get(specialized).name);
        Ok(specialized)
    }

    /// Declare (or take over `placeholder`), register and populate a
    /// specialization.
    #[expect(clippy::too_many_arguments, reason = "driver state threaded explicitly")]
    fn create(
        &self,
        module: &mut Module,
        cx: &mut SpecializationContext,
        plan: &ReabstractionPlan,
        name: String,
        placeholder: Option<FuncId>,
        home: ModuleId,
        notifier: &mut dyn FunctionNotifier,
    ) -> FuncId {
        let original = module.functions.get(plan.original());
        let mut decl = Function::new(name.as_str(), plan.create_specialized_type())
            .with_ownership(original.has_ownership)
            .with_linkage(Linkage::Shared)
            .in_module(home)
            .serialized(plan.is_serialized());
        decl.specialization_of = Some(SpecializationInfo {
            original: plan.original(),
            subs: plan.subs().clone(),
        });
        let id = match placeholder {
            Some(id) => {
                *module.functions.get_mut(id) = decl;
                id
            }
            None => module.add_function(decl, notifier),
        };
        cx.cache.insert(name.as_str(), id);

        transition(State::Cloning, &name);
        let roots = inlined_scope_roots(
            module,
            plan.original(),
            plan.subs(),
            &self.mangler,
            notifier,
        );
        let folded = clone_specialized_body(module, plan, id, roots, self.config.whole_module);
        if self.config.verify {
            if let Err(error) = verify_function(module.functions.get(id)) {
                panic!("specialization `{name}` failed verification: {error}");
            }
        }
        cx.stats.created += 1;
        cx.stats.folded += folded;
        cx.new_functions.push((plan.original(), id));
        tracing::debug!(
            state = %State::Populated,
            specialized = %name,
            folded,
            blocks = module.functions.get(id).block_count(),
            "specialize"
        );
        id
    }
}

// ── Call-site rewrite ───────────────────────────────────────────────

/// Arguments for the specialized call.
struct LoweredArgs {
    values: Vec<ValueId>,
    /// `(formal result index, caller address)` for results now returned
    /// directly.
    result_slots: Vec<(usize, ValueId)>,
    /// Values copied out of guaranteed slots, destroyed after the call.
    copies: Vec<ValueId>,
}

fn lower_args(fb: &mut FunctionBuilder<'_>, plan: &ReabstractionPlan, args: &[ValueId]) -> LoweredArgs {
    let mut lowered = LoweredArgs {
        values: Vec::with_capacity(args.len()),
        result_slots: Vec::new(),
        copies: Vec::new(),
    };
    if !plan.has_conversions() {
        lowered.values.extend_from_slice(args);
        return lowered;
    }

    let substituted = plan.substituted_type();
    let (addrs, params) = args.split_at(substituted.num_indirect_results());
    let indirect = substituted
        .results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.convention.is_indirect());
    for ((index, _), &addr) in indirect.zip(addrs) {
        if plan.is_result_converted(index) {
            lowered.result_slots.push((index, addr));
        } else {
            lowered.values.push(addr);
        }
    }

    let ossa = fb.func().has_ownership;
    for (index, (param, &arg)) in substituted.params.iter().zip(params).enumerate() {
        if !plan.is_param_converted(index) {
            lowered.values.push(arg);
            continue;
        }
        let guaranteed = param.convention == ParamConvention::IndirectInGuaranteed;
        let value = fb.load(arg, !guaranteed);
        if guaranteed && ossa && !fb.is_trivial(param.ty) {
            lowered.copies.push(value);
        }
        lowered.values.push(value);
    }
    lowered
}

/// Split the specialized call's direct results: converted ones are stored
/// into the caller's addresses, the rest are reassembled into the value
/// the original call produced.
#[expect(
    clippy::cast_possible_truncation,
    reason = "tuple arity is bounded by the signature"
)]
fn scatter_results(
    fb: &mut FunctionBuilder<'_>,
    specialized: &SilFunctionType,
    call: ValueId,
    result_slots: &[(usize, ValueId)],
) -> ValueId {
    if result_slots.is_empty() {
        return call;
    }
    let direct: Vec<usize> = specialized
        .results
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.convention.is_indirect())
        .map(|(i, _)| i)
        .collect();
    let parts: Vec<ValueId> = if direct.len() == 1 {
        vec![call]
    } else {
        (0..direct.len())
            .map(|i| fb.tuple_extract(call, i as u32))
            .collect()
    };

    let mut kept = Vec::new();
    for (formal, part) in direct.into_iter().zip(parts) {
        match result_slots.iter().find(|(index, _)| *index == formal) {
            Some(&(_, slot)) => {
                fb.store(part, slot, true);
            }
            None => kept.push(part),
        }
    }
    match kept.as_slice() {
        [] => fb.unit(),
        [only] => *only,
        _ => fb.tuple(kept),
    }
}

fn rewrite_call_site(
    module: &mut Module,
    caller: FuncId,
    inst: InstId,
    site: &CallSite,
    plan: &ReabstractionPlan,
    specialized: FuncId,
) {
    let Module {
        pool, functions, ..
    } = module;
    let spec_ty = functions.get(specialized).ty.clone();
    let fn_ty = spec_ty.lowered_type(pool);
    let func = functions.get_mut(caller);
    let data = func.inst(inst);
    let (loc, scope) = (data.loc, data.scope);
    let block = data
        .block
        .unwrap_or_else(|| panic!("{inst} in `{}` is not attached", func.name));
    let old_result = match site.kind {
        SiteKind::TryApply { .. } => None,
        _ => Some(func.result(inst)),
    };
    let old_ty = old_result.map(|r| func.value_type(r));

    let mut fb = FunctionBuilder::new(pool, &mut *func);
    fb.set_loc(loc);
    fb.set_scope(scope);
    fb.position_before(inst);
    let args = lower_args(&mut fb, plan, &site.args);
    let callee = fb.function_ref(specialized, fn_ty);
    let subs = SubstitutionMap::default();

    let new_result = match site.kind {
        SiteKind::Apply => {
            let result_ty = spec_ty.direct_result_type(fb.pool());
            let call = fb.apply(callee, subs, args.values, result_ty);
            let value = scatter_results(&mut fb, &spec_ty, call, &args.result_slots);
            for &copy in &args.copies {
                fb.destroy_value(copy);
            }
            Some(value)
        }
        SiteKind::PartialApply => {
            let closure_ty = old_ty.unwrap_or_else(|| panic!("partial_apply without a result"));
            Some(fb.partial_apply(callee, subs, args.values, closure_ty))
        }
        SiteKind::TryApply { normal, error } => {
            let bridged = !args.result_slots.is_empty() || !args.copies.is_empty();
            if bridged {
                let normal_bridge = fb.create_block_after(block);
                let error_bridge = if args.copies.is_empty() {
                    None
                } else {
                    Some(fb.create_block_after(normal_bridge))
                };
                fb.try_apply(
                    callee,
                    subs,
                    args.values,
                    normal_bridge,
                    error_bridge.unwrap_or(error),
                );

                fb.position_at_end(normal_bridge);
                let result_ty = spec_ty.direct_result_type(fb.pool());
                let result = fb.add_block_param(normal_bridge, result_ty);
                let value = scatter_results(&mut fb, &spec_ty, result, &args.result_slots);
                for &copy in &args.copies {
                    fb.destroy_value(copy);
                }
                fb.br(normal, vec![value]);

                if let Some(bridge) = error_bridge {
                    let error_param = fb.func().block_params(error).first().copied();
                    let error_ty = error_param
                        .map(|e| fb.func().value_type(e))
                        .unwrap_or_else(|| panic!("error block of {inst} takes no error value"));
                    fb.position_at_end(bridge);
                    let thrown = fb.add_block_param(bridge, error_ty);
                    for &copy in &args.copies {
                        fb.destroy_value(copy);
                    }
                    fb.br(error, vec![thrown]);
                }
            } else {
                fb.try_apply(callee, subs, args.values, normal, error);
            }
            None
        }
    };

    if let (Some(old), Some(new)) = (old_result, new_result) {
        func.replace_all_uses(old, new);
    }
    func.erase_inst(inst);
    if let Some(def) = func.defining_inst(site.callee) {
        if func.is_attached(def) && !func.has_uses(site.callee) {
            func.erase_inst(def);
        }
    }
}
