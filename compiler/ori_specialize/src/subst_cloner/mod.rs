//! Cloning a generic body under a fixed substitution.
//!
//! [`SubstRules`] plugs into [`RegionCloner`]. Every type, conformance and
//! callee substitution in the body is rewritten through the
//! specialization's map, and instructions whose meaning collapses once the
//! types are concrete are folded on the way:
//!
//! - calls compose their substitution with ours; a self-recursive call
//!   under the forwarding substitution calls the specialization directly
//! - `upcast` to the same type, and ownership operations on trivial types,
//!   disappear
//! - casts the classifier can decide become plain branches (through an
//!   `upcast` when proven to succeed), or a trap; arms left without
//!   predecessors are removed
//! - indirect conditional casts of loadable types become scalar casts
//! - `return`/`throw` run the epilogue for converted results and
//!   parameters
//!
//! The entry block is built first ([`clone_specialized_body`]): converted
//! indirect results get a stack slot the body writes into, and converted
//! parameters are spilled into a slot the body reads from.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::{smallvec, SmallVec};

use ori_ssa::graph::compute_preorder;
use ori_ssa::{
    BlockId, BuiltinOp, DebugScope, FuncId, Function, FunctionBuilder, FunctionNotifier, InstId,
    InstKind, Linkage, LoadQualifier, Module, OwnershipKind, ParamConvention, ScopeId,
    ScopeParent, ScopeTable, StoreQualifier, ValueId,
};
use ori_types::{Conformance, Idx, LoweringContext, Pool, SubstitutionMap, TypeLowering};

use crate::cast::{classify, CastFeasibility};
use crate::cloner::{remap_kind, remap_results, CloneCx, CloneEnv, CloneRules, RegionCloner, Visit};
use crate::mangle::Mangler;
use crate::reabstraction::ReabstractionPlan;

// ── Epilogue ────────────────────────────────────────────────────────

/// Stack slots introduced by the entry block and what exits must do
/// with them.
#[derive(Clone, Debug, Default)]
struct Epilogue {
    /// `(formal result index, slot)` of converted indirect results.
    result_slots: Vec<(usize, ValueId)>,
    /// Parameter slots holding a copy that must be destroyed on exit.
    destroy_slots: Vec<ValueId>,
    /// Every slot, in allocation order.
    allocs: Vec<ValueId>,
    /// Formal indices of the original direct results.
    orig_direct: Vec<usize>,
    /// Formal indices of the specialized direct results.
    spec_direct: Vec<usize>,
}

impl Epilogue {
    fn is_empty(&self) -> bool {
        self.allocs.is_empty()
    }
}

// ── Rules ───────────────────────────────────────────────────────────

/// [`CloneRules`] applying one substitution map.
pub struct SubstRules {
    subs: SubstitutionMap,
    lowering: TypeLowering,
    whole_module: bool,
    original: FuncId,
    /// A call under this map recurses into the function being specialized.
    forwarding: SubstitutionMap,
    specialized: FuncId,
    specialized_fn_ty: Idx,
    scope_roots: FxHashMap<FuncId, FuncId>,
    scope_map: FxHashMap<ScopeId, ScopeId>,
    epilogue: Epilogue,
    folds: usize,
}

impl SubstRules {
    /// Rules cloning `plan.original()` into `specialized`, whose lowered
    /// function type is `specialized_fn_ty`.
    pub fn new(
        pool: &mut Pool,
        plan: &ReabstractionPlan,
        specialized: FuncId,
        specialized_fn_ty: Idx,
        ctx: LoweringContext,
    ) -> Self {
        let forwarding = SubstitutionMap::forwarding(pool, plan.subs().signature());
        let mut scope_roots = FxHashMap::default();
        scope_roots.insert(plan.original(), specialized);
        Self {
            subs: plan.subs().clone(),
            lowering: TypeLowering::new(ctx),
            whole_module: ctx.whole_module,
            original: plan.original(),
            forwarding,
            specialized,
            specialized_fn_ty,
            scope_roots,
            scope_map: FxHashMap::default(),
            epilogue: Epilogue::default(),
            folds: 0,
        }
    }

    /// Re-root debug scopes owned by other functions.
    #[must_use]
    pub fn with_scope_roots(mut self, roots: impl IntoIterator<Item = (FuncId, FuncId)>) -> Self {
        self.scope_roots.extend(roots);
        self
    }

    /// Instructions folded away so far.
    pub fn folds(&self) -> usize {
        self.folds
    }

    fn is_trivial(&mut self, pool: &mut Pool, ty: Idx) -> bool {
        self.lowering.is_trivial(pool, ty)
    }

    fn is_loadable(&mut self, pool: &mut Pool, ty: Idx) -> bool {
        self.lowering.is_loadable(pool, ty)
    }

    fn classify(&self, pool: &mut Pool, source: Idx, target: Idx, exact: bool) -> CastFeasibility {
        classify(pool, source, target, exact, self.whole_module)
    }

    fn fold(&mut self, values: SmallVec<[ValueId; 1]>) -> Visit {
        self.folds += 1;
        Visit::Fold(values)
    }

    fn drop_inst(&mut self) -> Visit {
        self.folds += 1;
        Visit::Done
    }

    /// Ownership of a fresh value of type `ty` in the destination.
    fn owned(&mut self, cx: &mut CloneCx<'_>, ty: Idx) -> OwnershipKind {
        if cx.dest.has_ownership && !self.is_trivial(cx.pool, ty) {
            OwnershipKind::Owned
        } else {
            OwnershipKind::None
        }
    }

    /// Emit `kind` as the clone of `inst` and map its results.
    fn emit_as(&mut self, cx: &mut CloneCx<'_>, inst: InstId, kind: InstKind) -> Visit {
        let results = remap_results(self, cx, inst);
        let new = cx.emit(kind, &results);
        let values = cx.dest.inst(new).results.clone();
        cx.map_results(inst, &values);
        Visit::Done
    }

    fn load_take(&mut self, cx: &mut CloneCx<'_>, addr: ValueId) -> ValueId {
        let ty = cx.pool.child(cx.dest.value_type(addr));
        let qualifier = if !cx.dest.has_ownership {
            LoadQualifier::Unqualified
        } else if self.is_trivial(cx.pool, ty) {
            LoadQualifier::Trivial
        } else {
            LoadQualifier::Take
        };
        let own = self.owned(cx, ty);
        cx.emit_value(InstKind::Load { addr, qualifier }, ty, own)
    }

    fn store_init(&mut self, cx: &mut CloneCx<'_>, src: ValueId, dest: ValueId) {
        let ty = cx.dest.value_type(src);
        let qualifier = if !cx.dest.has_ownership {
            StoreQualifier::Unqualified
        } else if self.is_trivial(cx.pool, ty) {
            StoreQualifier::Trivial
        } else {
            StoreQualifier::Init
        };
        cx.emit_void(InstKind::Store {
            src,
            dest,
            qualifier,
        });
    }

    fn trap(cx: &mut CloneCx<'_>) {
        cx.emit(
            InstKind::Builtin {
                op: BuiltinOp::Trap,
                args: Vec::new(),
            },
            &[(Idx::UNIT, OwnershipKind::None)],
        );
        cx.emit_void(InstKind::Unreachable);
    }

    // ── Calls ───────────────────────────────────────────────────

    fn is_self_call(&self, src: &Function, callee: ValueId, subs: &SubstitutionMap) -> bool {
        let refs_original = src.defining_inst(callee).is_some_and(|def| {
            matches!(src.kind(def), InstKind::FunctionRef { func } if *func == self.original)
        });
        refs_original && *subs == self.forwarding
    }

    fn visit_apply_site(&mut self, cx: &mut CloneCx<'_>, inst: InstId) -> Visit {
        let src = cx.src;
        let kind = src.kind(inst);
        let Some((callee, subs, _)) = kind.apply_parts() else {
            return Visit::Clone;
        };
        if !self.is_self_call(src, callee, subs) {
            return Visit::Clone;
        }
        let callee_ty = self.remap_type(cx.pool, src.value_type(callee));
        if callee_ty != self.specialized_fn_ty {
            tracing::trace!(inst = %inst, "self call keeps the generic callee: signature changed");
            return Visit::Clone;
        }

        let new_callee = cx.emit_value(
            InstKind::FunctionRef {
                func: self.specialized,
            },
            self.specialized_fn_ty,
            OwnershipKind::None,
        );
        let mut kind = remap_kind(self, cx, kind);
        if let InstKind::Apply { callee, subs, .. }
        | InstKind::PartialApply { callee, subs, .. }
        | InstKind::TryApply { callee, subs, .. } = &mut kind
        {
            *callee = new_callee;
            *subs = SubstitutionMap::empty();
        }
        tracing::debug!(inst = %inst, "self-recursive call targets the specialization");
        self.emit_as(cx, inst, kind)
    }

    // ── Memory ──────────────────────────────────────────────────

    fn requalify(&mut self, cx: &mut CloneCx<'_>, inst: InstId) -> Visit {
        let src = cx.src;
        let mut kind = remap_kind(self, cx, src.kind(inst));
        let ossa = cx.dest.has_ownership;
        match &mut kind {
            InstKind::Load { addr, qualifier } => {
                let ty = cx.pool.child(cx.dest.value_type(*addr));
                if !ossa {
                    *qualifier = LoadQualifier::Unqualified;
                } else if self.is_trivial(cx.pool, ty) {
                    *qualifier = LoadQualifier::Trivial;
                }
            }
            InstKind::Store { src, qualifier, .. } => {
                let ty = cx.dest.value_type(*src);
                if !ossa {
                    *qualifier = StoreQualifier::Unqualified;
                } else if self.is_trivial(cx.pool, ty) {
                    *qualifier = StoreQualifier::Trivial;
                }
            }
            _ => {}
        }
        self.emit_as(cx, inst, kind)
    }

    // ── Casts ───────────────────────────────────────────────────

    /// Emit a cast the classifier proved will succeed: an `upcast` between
    /// classes, otherwise an unconditional cast.
    fn emit_proven_cast(&mut self, cx: &mut CloneCx<'_>, operand: ValueId, target: Idx) -> ValueId {
        let source = cx.dest.value_type(operand);
        if source == target {
            return operand;
        }
        let own = cx.dest.value_ownership(operand);
        let kind = if cx.pool.is_class(source) && cx.pool.is_class(target) {
            InstKind::Upcast {
                operand,
                ty: target,
            }
        } else {
            InstKind::UnconditionalCheckedCast {
                operand,
                ty: target,
            }
        };
        cx.emit_value(kind, target, own)
    }

    fn visit_checked_cast_br(
        &mut self,
        cx: &mut CloneCx<'_>,
        operand: ValueId,
        target_ty: Idx,
        exact: bool,
        success: BlockId,
        failure: BlockId,
    ) -> Visit {
        let operand = cx.lookup(operand);
        let target = self.remap_type(cx.pool, target_ty);
        let source = cx.dest.value_type(operand);
        match self.classify(cx.pool, source, target, exact) {
            CastFeasibility::WillFail => {
                let args = if cx.src.has_ownership {
                    vec![operand]
                } else {
                    Vec::new()
                };
                let dest = cx.lookup_block(failure);
                cx.emit_void(InstKind::Br { dest, args });
                self.drop_inst()
            }
            CastFeasibility::WillSucceed => {
                let cast = self.emit_proven_cast(cx, operand, target);
                let dest = cx.lookup_block(success);
                cx.emit_void(InstKind::Br {
                    dest,
                    args: vec![cast],
                });
                self.drop_inst()
            }
            CastFeasibility::MaySucceed => Visit::Clone,
        }
    }

    /// Rewrite an indirect conditional cast of loadable types into
    /// `load` + scalar cast + `store`.
    fn visit_checked_cast_addr_br(&mut self, cx: &mut CloneCx<'_>, inst: InstId) -> Visit {
        let src = cx.src;
        let InstKind::CheckedCastAddrBr {
            src: from,
            src_ty,
            dest: to,
            target_ty,
            success,
            failure,
            weights,
        } = src.kind(inst)
        else {
            return Visit::Clone;
        };
        let source = self.remap_type(cx.pool, *src_ty);
        let target = self.remap_type(cx.pool, *target_ty);
        let feasibility = self.classify(cx.pool, source, target, false);
        let (success, failure) = (cx.lookup_block(*success), cx.lookup_block(*failure));

        if feasibility == CastFeasibility::WillFail {
            cx.emit_void(InstKind::Br {
                dest: failure,
                args: Vec::new(),
            });
            return self.drop_inst();
        }
        if !self.is_loadable(cx.pool, source) || !self.is_loadable(cx.pool, target) {
            return Visit::Clone;
        }

        let (from, to) = (cx.lookup(*from), cx.lookup(*to));
        let value = self.load_take(cx, from);
        if feasibility == CastFeasibility::WillSucceed {
            let cast = self.emit_proven_cast(cx, value, target);
            self.store_init(cx, cast, to);
            cx.emit_void(InstKind::Br {
                dest: success,
                args: Vec::new(),
            });
            tracing::trace!(inst = %inst, "indirect cast always succeeds");
            return Visit::Done;
        }

        let here = cx.current_block();
        let on_success = cx.create_block_after(here);
        let on_failure = cx.create_block_after(on_success);
        let target_own = self.owned(cx, target);
        let cast = cx.dest.add_block_param(on_success, target, target_own);
        let back = if cx.dest.has_ownership {
            let own = self.owned(cx, source);
            cx.dest.add_block_param(on_failure, source, own)
        } else {
            value
        };
        cx.emit_void(InstKind::CheckedCastBr {
            operand: value,
            target_ty: target,
            exact: false,
            success: on_success,
            failure: on_failure,
            weights: *weights,
        });

        cx.set_block(on_success);
        self.store_init(cx, cast, to);
        cx.emit_void(InstKind::Br {
            dest: success,
            args: Vec::new(),
        });

        cx.set_block(on_failure);
        self.store_init(cx, back, from);
        cx.emit_void(InstKind::Br {
            dest: failure,
            args: Vec::new(),
        });
        tracing::trace!(inst = %inst, "indirect cast rewritten to scalar form");
        Visit::Done
    }

    // ── Exits ───────────────────────────────────────────────────

    fn cleanup_slots(&self, cx: &mut CloneCx<'_>) {
        for &slot in &self.epilogue.destroy_slots {
            cx.emit_void(InstKind::DestroyAddr { addr: slot });
        }
        for &slot in self.epilogue.allocs.iter().rev() {
            cx.emit_void(InstKind::DeallocStack { addr: slot });
        }
    }

    fn visit_return(&mut self, cx: &mut CloneCx<'_>, value: ValueId) -> Visit {
        let value = cx.lookup(value);
        let epilogue = self.epilogue.clone();
        let mut by_formal: SmallVec<[(usize, ValueId); 4]> = SmallVec::new();

        match epilogue.orig_direct.as_slice() {
            [] => {}
            [only] => by_formal.push((*only, value)),
            many => {
                let elem_tys = cx.pool.tuple_elems(cx.dest.value_type(value));
                for ((&formal, &ty), index) in many.iter().zip(&elem_tys).zip(0u32..) {
                    let own = self.owned(cx, ty);
                    let elem =
                        cx.emit_value(InstKind::TupleExtract { operand: value, index }, ty, own);
                    by_formal.push((formal, elem));
                }
            }
        }
        for &(formal, slot) in &epilogue.result_slots {
            let loaded = self.load_take(cx, slot);
            by_formal.push((formal, loaded));
        }

        let values: Vec<ValueId> = epilogue
            .spec_direct
            .iter()
            .map(|formal| {
                by_formal
                    .iter()
                    .find(|(f, _)| f == formal)
                    .map(|&(_, v)| v)
                    .unwrap_or_else(|| panic!("no value for direct result #{formal}"))
            })
            .collect();
        let result = match values.as_slice() {
            [single] => *single,
            elems => {
                let tys: Vec<Idx> = elems.iter().map(|&v| cx.dest.value_type(v)).collect();
                let ty = cx.pool.tuple(&tys);
                let own = self.owned(cx, ty);
                cx.emit_value(
                    InstKind::Tuple {
                        elems: elems.to_vec(),
                    },
                    ty,
                    own,
                )
            }
        };

        self.cleanup_slots(cx);
        cx.emit_void(InstKind::Return { value: result });
        Visit::Done
    }

    fn visit_throw(&mut self, cx: &mut CloneCx<'_>, value: ValueId) -> Visit {
        let value = cx.lookup(value);
        self.cleanup_slots(cx);
        cx.emit_void(InstKind::Throw { value });
        Visit::Done
    }
}

impl CloneRules for SubstRules {
    fn remap_type(&mut self, pool: &mut Pool, ty: Idx) -> Idx {
        let ty = pool.subst(ty, &self.subs);
        self.lowering.lower(pool, ty)
    }

    fn remap_subs(&mut self, pool: &mut Pool, subs: &SubstitutionMap) -> SubstitutionMap {
        subs.subst(pool, &self.subs)
    }

    fn remap_conformance(&mut self, pool: &mut Pool, conf: &Conformance) -> Conformance {
        pool.subst_conformance(conf, &self.subs)
    }

    fn remap_ownership(&mut self, pool: &mut Pool, ty: Idx, kind: OwnershipKind) -> OwnershipKind {
        if kind != OwnershipKind::None && self.is_trivial(pool, ty) {
            OwnershipKind::None
        } else {
            kind
        }
    }

    /// Structural copy of the scope chain, re-rooted.
    fn remap_scope(&mut self, scopes: &mut ScopeTable, scope: ScopeId) -> ScopeId {
        if let Some(&mapped) = self.scope_map.get(&scope) {
            return mapped;
        }
        let old = *scopes.get(scope);
        let parent = match old.parent {
            ScopeParent::Function(f) => {
                ScopeParent::Function(self.scope_roots.get(&f).copied().unwrap_or(f))
            }
            ScopeParent::Scope(p) => ScopeParent::Scope(self.remap_scope(scopes, p)),
        };
        let inlined_at = old.inlined_at.map(|s| self.remap_scope(scopes, s));
        let new = scopes.add(DebugScope {
            loc: old.loc,
            parent,
            inlined_at,
        });
        self.scope_map.insert(scope, new);
        new
    }

    fn visit(&mut self, cx: &mut CloneCx<'_>, inst: InstId) -> Visit {
        let src = cx.src;
        match src.kind(inst) {
            InstKind::Apply { .. } | InstKind::PartialApply { .. } | InstKind::TryApply { .. } => {
                self.visit_apply_site(cx, inst)
            }
            InstKind::Upcast { operand, ty } => {
                let operand = cx.lookup(*operand);
                let ty = self.remap_type(cx.pool, *ty);
                if cx.dest.value_type(operand) == ty {
                    self.fold(smallvec![operand])
                } else {
                    Visit::Clone
                }
            }
            InstKind::CopyValue { operand } => {
                let operand = cx.lookup(*operand);
                let ty = cx.dest.value_type(operand);
                if self.is_trivial(cx.pool, ty) {
                    self.fold(smallvec![operand])
                } else {
                    Visit::Clone
                }
            }
            InstKind::DestroyValue { operand } => {
                let ty = cx.dest.value_type(cx.lookup(*operand));
                if self.is_trivial(cx.pool, ty) {
                    self.drop_inst()
                } else {
                    Visit::Clone
                }
            }
            InstKind::DestroyAddr { addr } => {
                let ty = cx.pool.child(cx.dest.value_type(cx.lookup(*addr)));
                if self.is_trivial(cx.pool, ty) {
                    self.drop_inst()
                } else {
                    Visit::Clone
                }
            }
            InstKind::Load { .. } | InstKind::Store { .. } => self.requalify(cx, inst),
            InstKind::UnconditionalCheckedCast { operand, ty } => {
                let operand = cx.lookup(*operand);
                let target = self.remap_type(cx.pool, *ty);
                let source = cx.dest.value_type(operand);
                match self.classify(cx.pool, source, target, false) {
                    CastFeasibility::WillSucceed if source == target => {
                        self.fold(smallvec![operand])
                    }
                    CastFeasibility::WillSucceed
                        if cx.pool.is_class(source) && cx.pool.is_class(target) =>
                    {
                        self.folds += 1;
                        self.emit_as(cx, inst, InstKind::Upcast { operand, ty: target })
                    }
                    CastFeasibility::WillFail => {
                        tracing::debug!(inst = %inst, "cast always fails; trapping");
                        Self::trap(cx);
                        let undef = cx.dest.undef(target);
                        self.fold(smallvec![undef])
                    }
                    _ => Visit::Clone,
                }
            }
            InstKind::UnconditionalCheckedCastAddr {
                src_ty, target_ty, ..
            } => {
                let source = self.remap_type(cx.pool, *src_ty);
                let target = self.remap_type(cx.pool, *target_ty);
                if self.classify(cx.pool, source, target, false) == CastFeasibility::WillFail {
                    tracing::debug!(inst = %inst, "indirect cast always fails; trapping");
                    Self::trap(cx);
                    self.drop_inst()
                } else {
                    Visit::Clone
                }
            }
            InstKind::CheckedCastBr {
                operand,
                target_ty,
                exact,
                success,
                failure,
                ..
            } => self.visit_checked_cast_br(cx, *operand, *target_ty, *exact, *success, *failure),
            InstKind::CheckedCastAddrBr { .. } => self.visit_checked_cast_addr_br(cx, inst),
            InstKind::Return { value } if !self.epilogue.is_empty() => self.visit_return(cx, *value),
            InstKind::Throw { value } if !self.epilogue.is_empty() => self.visit_throw(cx, *value),
            _ => Visit::Clone,
        }
    }
}

// ── Entry ───────────────────────────────────────────────────────────

/// Build the specialized entry block and the values the original entry
/// parameters map to.
fn emit_entry(
    rules: &mut SubstRules,
    pool: &mut Pool,
    dest: &mut Function,
    plan: &ReabstractionPlan,
    ctx: LoweringContext,
) -> (BlockId, Vec<ValueId>) {
    let substituted = plan.substituted_type();
    let specialized = plan.specialized_type();
    let ossa = dest.has_ownership;
    let entry = dest.create_block();

    let arg_tys = specialized.entry_arg_types(pool);
    let mut args = Vec::with_capacity(arg_tys.len());
    for (ty, own) in arg_tys.into_iter().zip(specialized.entry_arg_ownership()) {
        let own = if ossa && !rules.is_trivial(pool, ty) {
            own
        } else {
            OwnershipKind::None
        };
        args.push(dest.add_block_param(entry, ty, own));
    }
    let mut args = args.into_iter();
    let mut next_arg = || {
        args.next()
            .unwrap_or_else(|| panic!("specialized entry block has too few arguments"))
    };

    let epilogue = &mut rules.epilogue;
    let mut fb = FunctionBuilder::with_context(pool, dest, ctx);
    fb.position_at_end(entry);
    let mut mapping = Vec::new();

    for (index, result) in substituted.results.iter().enumerate() {
        if !result.convention.is_indirect() {
            epilogue.orig_direct.push(index);
        } else if plan.is_result_converted(index) {
            let slot = fb.alloc_stack(result.ty);
            epilogue.allocs.push(slot);
            epilogue.result_slots.push((index, slot));
            mapping.push(slot);
        } else {
            mapping.push(next_arg());
        }
    }
    epilogue.spec_direct = specialized
        .results
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.convention.is_indirect())
        .map(|(i, _)| i)
        .collect();

    for (index, param) in substituted.params.iter().enumerate() {
        let arg = next_arg();
        if !plan.is_param_converted(index) {
            mapping.push(arg);
            continue;
        }
        let slot = fb.alloc_stack(param.ty);
        epilogue.allocs.push(slot);
        let guaranteed = param.convention == ParamConvention::IndirectInGuaranteed;
        let value = if guaranteed && ossa && !fb.is_trivial(param.ty) {
            epilogue.destroy_slots.push(slot);
            fb.copy_value(arg)
        } else {
            arg
        };
        fb.store(value, slot, true);
        mapping.push(slot);
    }
    (entry, mapping)
}

/// Populate the declaration `specialized` with the body of
/// `plan.original()` under `plan.subs()`.
///
/// `scope_roots` re-roots debug scopes of functions inlined into the
/// original (see [`inlined_scope_roots`]). Returns the number of
/// instructions folded away.
///
/// # Panics
/// Panics if `specialized` already has a body or the original has none.
pub fn clone_specialized_body(
    module: &mut Module,
    plan: &ReabstractionPlan,
    specialized: FuncId,
    scope_roots: FxHashMap<FuncId, FuncId>,
    whole_module: bool,
) -> usize {
    let Module {
        pool,
        functions,
        scopes,
        ..
    } = module;
    let (src, dest) = functions.pair_mut(plan.original(), specialized);
    assert!(
        dest.is_declaration(),
        "specialization `{}` already has a body",
        dest.name
    );
    let ctx = LoweringContext::new(dest.module)
        .whole_module(whole_module)
        .serialized(dest.serialized);
    let specialized_fn_ty = dest.ty.lowered_type(pool);
    let mut rules =
        SubstRules::new(pool, plan, specialized, specialized_fn_ty, ctx).with_scope_roots(scope_roots);
    if let Some(scope) = src.scope {
        dest.scope = Some(rules.remap_scope(scopes, scope));
    }

    let (entry, mapping) = emit_entry(&mut rules, pool, dest, plan, ctx);
    let mut cloner = RegionCloner::new(rules);
    cloner.clone_function_body(
        CloneEnv {
            pool,
            scopes,
            src: &*src,
            dest: &mut *dest,
            in_place: false,
        },
        entry,
        &mapping,
    );
    remove_unreachable_blocks(dest);
    erase_dead_refs(dest, plan.original());

    let folds = cloner.rules().folds();
    tracing::debug!(
        original = %src.name,
        specialized = %dest.name,
        folds,
        "cloned specialized body"
    );
    folds
}

/// Drop blocks that decided casts left without predecessors.
fn remove_unreachable_blocks(func: &mut Function) {
    let reachable: FxHashSet<BlockId> = compute_preorder(func).into_iter().collect();
    let dead: Vec<BlockId> = func
        .layout()
        .iter()
        .copied()
        .filter(|b| !reachable.contains(b))
        .collect();
    if dead.is_empty() {
        return;
    }
    tracing::trace!(func = %func.name, count = dead.len(), "removing unreachable blocks");
    for block in dead {
        func.remove_block(block);
    }
}

/// Drop `function_ref`s to `target` left without uses.
fn erase_dead_refs(func: &mut Function, target: FuncId) {
    for inst in func.insts_in_layout_order() {
        let is_ref = matches!(func.kind(inst), InstKind::FunctionRef { func: f } if *f == target);
        if is_ref && !func.has_uses(func.result(inst)) {
            func.erase_inst(inst);
        }
    }
}

/// New roots for debug scopes of functions inlined into `original`.
///
/// A generic inlined function whose instantiation changes under `subs` is
/// represented by a debug-only declaration named by `mangler`, created on
/// first use. Everything else keeps its root.
pub fn inlined_scope_roots(
    module: &mut Module,
    original: FuncId,
    subs: &SubstitutionMap,
    mangler: &dyn Mangler,
    notifier: &mut dyn FunctionNotifier,
) -> FxHashMap<FuncId, FuncId> {
    let func = module.functions.get(original);
    let mut pending: Vec<ScopeId> = func
        .insts_in_layout_order()
        .into_iter()
        .filter_map(|i| func.inst(i).scope)
        .collect();
    let mut seen = FxHashSet::default();
    let mut roots: Vec<FuncId> = Vec::new();
    while let Some(scope) = pending.pop() {
        if !seen.insert(scope) {
            continue;
        }
        let data = module.scopes.get(scope);
        match data.parent {
            ScopeParent::Function(f) if f != original && !roots.contains(&f) => roots.push(f),
            ScopeParent::Function(_) => {}
            ScopeParent::Scope(p) => pending.push(p),
        }
        pending.extend(data.inlined_at);
    }
    roots.sort_unstable();

    let identity = subs.is_identity(&module.pool);
    let mut map = FxHashMap::default();
    for root in roots {
        let inlined = module.functions.get(root);
        if !inlined.ty.is_generic() || identity {
            continue;
        }
        let name = mangler.mangle(&module.pool, &inlined.name, subs, false);
        let debug_root = match module.functions.lookup(&name) {
            Some(existing) => existing,
            None => {
                let mut decl = Function::new(name, inlined.ty.clone())
                    .with_linkage(Linkage::Private)
                    .in_module(inlined.module);
                decl.debug_only = true;
                module.add_function(decl, notifier)
            }
        };
        map.insert(root, debug_root);
    }
    map
}
