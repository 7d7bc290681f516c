//! Structural cloning of CFG regions and whole function bodies.
//!
//! [`RegionCloner`] duplicates the blocks reachable from a start block,
//! stopping at caller-supplied exit blocks, and records an old→new mapping
//! for every value and block it visits. What happens to each instruction
//! is decided by a [`CloneRules`] implementation: the default clones it
//! through [`remap_kind`] unchanged, while a rule may fold it onto existing
//! values or emit something else entirely.
//!
//! # Algorithm
//!
//! 1. The start block is mapped to a fresh destination block; exits map to
//!    themselves. Unmapped start-block parameters are cloned first.
//! 2. Blocks are popped from a worklist. Every non-terminator is cloned.
//!    Each not-yet-mapped successor gets a destination block laid out after
//!    the current one (new successors chain after each other), its
//!    parameters are cloned, and it is pushed. Successors are pushed in
//!    reverse so popping yields a deterministic preorder.
//! 3. Once every block is discovered, terminators are cloned in discovery
//!    order, so every branch target and every value already exists.
//! 4. Fix-ups run: ownership-only default arguments are dropped when the
//!    destination is not in ownership SSA, and code following a mid-block
//!    `unreachable` is deleted.
//!
//! Looking up a value that was never mapped is a bug and panics. Undefined
//! sentinels are the exception: they are re-created in the destination
//! with their type remapped.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use ori_ssa::{
    BlockId, FuncId, Function, FunctionNotifier, InstId, InstKind, Module, OwnershipKind, ScopeId,
    ScopeTable, SourceLoc, ValueDef, ValueId,
};
use ori_types::{Conformance, Idx, Pool, SubstitutionMap};

// ── Rules ───────────────────────────────────────────────────────────

/// Outcome of [`CloneRules::visit`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Visit {
    /// Clone the instruction through [`remap_kind`].
    Clone,
    /// Emit nothing; the source results map to these destination values.
    Fold(SmallVec<[ValueId; 1]>),
    /// The rule emitted its replacement and mapped the results itself.
    Done,
}

/// Per-instruction cloning policy.
///
/// Every method has an identity default.
pub trait CloneRules {
    fn remap_type(&mut self, _pool: &mut Pool, ty: Idx) -> Idx {
        ty
    }

    fn remap_subs(&mut self, _pool: &mut Pool, subs: &SubstitutionMap) -> SubstitutionMap {
        subs.clone()
    }

    fn remap_conformance(&mut self, _pool: &mut Pool, conf: &Conformance) -> Conformance {
        conf.clone()
    }

    /// Ownership of a cloned value whose remapped type is `ty`. Only
    /// consulted when the destination is in ownership SSA.
    fn remap_ownership(&mut self, _pool: &mut Pool, _ty: Idx, kind: OwnershipKind) -> OwnershipKind {
        kind
    }

    fn remap_scope(&mut self, _scopes: &mut ScopeTable, scope: ScopeId) -> ScopeId {
        scope
    }

    fn visit(&mut self, _cx: &mut CloneCx<'_>, _inst: InstId) -> Visit {
        Visit::Clone
    }
}

/// Clone everything unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityRules;

impl CloneRules for IdentityRules {}

// ── State ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Body,
    Terminators,
}

#[derive(Debug, Default)]
struct CloneState {
    values: FxHashMap<ValueId, ValueId>,
    blocks: FxHashMap<BlockId, BlockId>,
    /// Source blocks in discovery order.
    preorder: Vec<BlockId>,
    /// Destination block that ends the clone of each source block's body.
    tails: FxHashMap<BlockId, BlockId>,
    /// Destination blocks that received an `unreachable` mid-block.
    unreachable_blocks: Vec<BlockId>,
    /// `(block, operand)`: drop the block's default argument, using the
    /// operand instead.
    default_args: Vec<(BlockId, ValueId)>,
    started: bool,
}

/// Borrowed environment for one cloning run.
pub struct CloneEnv<'a> {
    pub pool: &'a mut Pool,
    pub scopes: &'a mut ScopeTable,
    pub src: &'a Function,
    pub dest: &'a mut Function,
    /// `src` is a snapshot of `dest`: values defined outside the cloned
    /// region are used as they are.
    pub in_place: bool,
}

/// What a [`CloneRules`] implementation sees while cloning.
pub struct CloneCx<'a> {
    pub pool: &'a mut Pool,
    pub scopes: &'a mut ScopeTable,
    pub src: &'a Function,
    pub dest: &'a mut Function,
    state: &'a mut CloneState,
    in_place: bool,
    block: BlockId,
    loc: SourceLoc,
    scope: Option<ScopeId>,
    phase: Phase,
}

impl CloneCx<'_> {
    /// The destination value for a source value.
    ///
    /// # Panics
    /// Panics if `value` was not mapped yet.
    pub fn lookup(&self, value: ValueId) -> ValueId {
        if let Some(&mapped) = self.state.values.get(&value) {
            return mapped;
        }
        if self.in_place && !self.defined_in_region(value) {
            return value;
        }
        panic!(
            "cloning `{}`: {value} is used before it was mapped",
            self.src.name
        )
    }

    fn defined_in_region(&self, value: ValueId) -> bool {
        let def_block = match self.src.value(value).def {
            ValueDef::Param { block, .. } => Some(block),
            ValueDef::Result { inst, .. } => self.src.inst(inst).block,
            ValueDef::Undef => None,
        };
        def_block.is_some_and(|b| self.state.blocks.get(&b).is_some_and(|&m| m != b))
    }

    pub fn lookup_all(&self, values: &[ValueId]) -> Vec<ValueId> {
        values.iter().map(|&v| self.lookup(v)).collect()
    }

    /// # Panics
    /// Panics if `block` was not mapped yet.
    pub fn lookup_block(&self, block: BlockId) -> BlockId {
        self.state
            .blocks
            .get(&block)
            .copied()
            .unwrap_or_else(|| panic!("cloning `{}`: {block} is not mapped", self.src.name))
    }

    pub fn map_value(&mut self, old: ValueId, new: ValueId) {
        self.state.values.insert(old, new);
    }

    /// Map the results of source instruction `inst`, in order.
    ///
    /// # Panics
    /// Panics if the counts differ.
    pub fn map_results(&mut self, inst: InstId, values: &[ValueId]) {
        let results = &self.src.inst(inst).results;
        assert_eq!(
            results.len(),
            values.len(),
            "cloning `{}`: {} of {inst} maps {} results onto {} values",
            self.src.name,
            self.src.kind(inst).name(),
            results.len(),
            values.len()
        );
        for (&old, &new) in results.iter().zip(values) {
            self.state.values.insert(old, new);
        }
    }

    /// Destination block receiving new instructions.
    pub fn current_block(&self) -> BlockId {
        self.block
    }

    /// Redirect emission, e.g. after splitting off a bridge block.
    pub fn set_block(&mut self, block: BlockId) {
        self.block = block;
    }

    pub fn create_block_after(&mut self, after: BlockId) -> BlockId {
        self.dest.create_block_after(after)
    }

    pub fn loc(&self) -> SourceLoc {
        self.loc
    }

    pub fn scope(&self) -> Option<ScopeId> {
        self.scope
    }

    /// `kind` if the destination is in ownership SSA, else `None`.
    pub fn ownership(&self, kind: OwnershipKind) -> OwnershipKind {
        if self.dest.has_ownership {
            kind
        } else {
            OwnershipKind::None
        }
    }

    /// Append to the current destination block.
    pub fn emit(&mut self, kind: InstKind, results: &[(Idx, OwnershipKind)]) -> InstId {
        if self.phase == Phase::Body && kind.is_terminator() {
            debug_assert!(
                matches!(kind, InstKind::Unreachable),
                "only `unreachable` may be emitted mid-block, got {}",
                kind.name()
            );
            if !self.state.unreachable_blocks.contains(&self.block) {
                self.state.unreachable_blocks.push(self.block);
            }
        }
        self.dest
            .append_inst(self.block, kind, results, self.loc, self.scope)
    }

    pub fn emit_value(&mut self, kind: InstKind, ty: Idx, ownership: OwnershipKind) -> ValueId {
        let own = self.ownership(ownership);
        let inst = self.emit(kind, &[(ty, own)]);
        self.dest.result(inst)
    }

    pub fn emit_void(&mut self, kind: InstKind) -> InstId {
        self.emit(kind, &[])
    }
}

// ── Shared helpers ──────────────────────────────────────────────────

/// Clone `kind` with operands, blocks, types, substitutions and
/// conformances remapped.
pub fn remap_kind<R: CloneRules + ?Sized>(
    rules: &mut R,
    cx: &mut CloneCx<'_>,
    kind: &InstKind,
) -> InstKind {
    let mut kind = kind.clone();
    kind.map_operands(|v| cx.lookup(v));
    kind.map_blocks(|b| cx.lookup_block(b));
    let pool = &mut *cx.pool;
    match &mut kind {
        InstKind::Apply { subs, .. }
        | InstKind::PartialApply { subs, .. }
        | InstKind::TryApply { subs, .. } => *subs = rules.remap_subs(pool, subs),
        InstKind::WitnessMethod {
            lookup_ty,
            conformance,
            ..
        } => {
            *lookup_ty = rules.remap_type(pool, *lookup_ty);
            *conformance = rules.remap_conformance(pool, conformance);
        }
        InstKind::AllocStack { ty }
        | InstKind::Upcast { ty, .. }
        | InstKind::UnconditionalCheckedCast { ty, .. }
        | InstKind::Metatype { ty }
        | InstKind::CheckedCastBr { target_ty: ty, .. } => *ty = rules.remap_type(pool, *ty),
        InstKind::UnconditionalCheckedCastAddr {
            src_ty, target_ty, ..
        }
        | InstKind::CheckedCastAddrBr {
            src_ty, target_ty, ..
        } => {
            *src_ty = rules.remap_type(pool, *src_ty);
            *target_ty = rules.remap_type(pool, *target_ty);
        }
        InstKind::InitExistentialAddr {
            concrete_ty,
            conformances,
            ..
        } => {
            *concrete_ty = rules.remap_type(pool, *concrete_ty);
            for c in conformances.iter_mut() {
                *c = rules.remap_conformance(pool, c);
            }
        }
        _ => {}
    }
    kind
}

/// Remapped `(type, ownership)` of each result of source instruction `inst`.
pub fn remap_results<R: CloneRules + ?Sized>(
    rules: &mut R,
    cx: &mut CloneCx<'_>,
    inst: InstId,
) -> SmallVec<[(Idx, OwnershipKind); 1]> {
    let src = cx.src;
    src.inst(inst)
        .results
        .iter()
        .map(|&r| {
            let data = src.value(r);
            let ty = rules.remap_type(cx.pool, data.ty);
            let own = if cx.dest.has_ownership {
                rules.remap_ownership(cx.pool, ty, data.ownership)
            } else {
                OwnershipKind::None
            };
            (ty, own)
        })
        .collect()
}

fn clone_params<R: CloneRules + ?Sized>(
    rules: &mut R,
    cx: &mut CloneCx<'_>,
    src_block: BlockId,
    dest_block: BlockId,
) {
    let src = cx.src;
    for &param in src.block_params(src_block) {
        if cx.state.values.contains_key(&param) {
            continue;
        }
        let data = src.value(param);
        let ty = rules.remap_type(cx.pool, data.ty);
        let own = if cx.dest.has_ownership {
            rules.remap_ownership(cx.pool, ty, data.ownership)
        } else {
            OwnershipKind::None
        };
        let new = cx.dest.add_block_param(dest_block, ty, own);
        cx.state.values.insert(param, new);
    }
}

fn clone_inst<R: CloneRules + ?Sized>(rules: &mut R, cx: &mut CloneCx<'_>, inst: InstId) {
    let src = cx.src;
    let data = src.inst(inst);
    cx.loc = data.loc;
    cx.scope = data.scope.map(|s| rules.remap_scope(cx.scopes, s));
    match rules.visit(cx, inst) {
        Visit::Clone => {
            let kind = remap_kind(rules, cx, &data.kind);
            let results = remap_results(rules, cx, inst);
            let new = cx.emit(kind, &results);
            let new_results = cx.dest.inst(new).results.clone();
            cx.map_results(inst, &new_results);
            note_default_arg(cx, new);
        }
        Visit::Fold(values) => cx.map_results(inst, &values),
        Visit::Done => {}
    }
}

/// Queue removal of an ownership-only default argument.
fn note_default_arg(cx: &mut CloneCx<'_>, new: InstId) {
    if !cx.src.has_ownership || cx.dest.has_ownership {
        return;
    }
    let pending = match cx.dest.kind(new) {
        InstKind::CheckedCastBr {
            operand, failure, ..
        } => Some((*failure, *operand)),
        InstKind::SwitchEnum {
            operand,
            default: Some(default),
            ..
        } => Some((*default, *operand)),
        _ => None,
    };
    cx.state.default_args.extend(pending);
}

// ── Cloner ──────────────────────────────────────────────────────────

/// Worklist-driven CFG cloner parameterized by [`CloneRules`].
///
/// A cloner runs once; cloning again with the same state panics.
pub struct RegionCloner<R> {
    rules: R,
    state: CloneState,
}

impl<R: CloneRules> RegionCloner<R> {
    pub fn new(rules: R) -> Self {
        Self {
            rules,
            state: CloneState::default(),
        }
    }

    pub fn rules(&self) -> &R {
        &self.rules
    }

    pub fn into_rules(self) -> R {
        self.rules
    }

    /// Pre-map a source value, e.g. a region input.
    pub fn map_value(&mut self, old: ValueId, new: ValueId) {
        self.state.values.insert(old, new);
    }

    /// Pre-map a source block; it will not be cloned.
    pub fn map_block(&mut self, old: BlockId, new: BlockId) {
        self.state.blocks.insert(old, new);
    }

    pub fn value(&self, old: ValueId) -> Option<ValueId> {
        self.state.values.get(&old).copied()
    }

    pub fn block(&self, old: BlockId) -> Option<BlockId> {
        self.state.blocks.get(&old).copied()
    }

    /// Source blocks in the order they were discovered.
    pub fn preorder(&self) -> &[BlockId] {
        &self.state.preorder
    }

    /// Clone the region starting at `start` and stopping at `exits`.
    ///
    /// Returns the destination block corresponding to `start`. Exit
    /// blocks map to themselves unless the caller mapped them already.
    pub fn clone_region(&mut self, env: CloneEnv<'_>, start: BlockId, exits: &[BlockId]) -> BlockId {
        for &exit in exits {
            self.state.blocks.entry(exit).or_insert(exit);
        }
        let dest_start = env.dest.create_block();
        self.run(env, start, dest_start);
        dest_start
    }

    /// Clone a region of `func` into `func` itself.
    pub fn clone_region_in_place(
        &mut self,
        pool: &mut Pool,
        scopes: &mut ScopeTable,
        func: &mut Function,
        start: BlockId,
        exits: &[BlockId],
    ) -> BlockId {
        let snapshot = func.clone();
        self.clone_region(
            CloneEnv {
                pool,
                scopes,
                src: &snapshot,
                dest: func,
                in_place: true,
            },
            start,
            exits,
        )
    }

    /// Clone the whole body of `env.src`. The source entry block is cloned
    /// into `dest_entry` (after anything already there) and its
    /// parameters map to `entry_args`.
    ///
    /// # Panics
    /// Panics if the source is a declaration or the argument count differs.
    pub fn clone_function_body(
        &mut self,
        env: CloneEnv<'_>,
        dest_entry: BlockId,
        entry_args: &[ValueId],
    ) {
        let entry = env
            .src
            .entry_block()
            .unwrap_or_else(|| panic!("cannot clone the body of declaration `{}`", env.src.name));
        let params = env.src.block_params(entry);
        assert_eq!(
            params.len(),
            entry_args.len(),
            "`{}` has {} entry parameters, {} arguments supplied",
            env.src.name,
            params.len(),
            entry_args.len()
        );
        for (&param, &arg) in params.iter().zip(entry_args) {
            self.state.values.insert(param, arg);
        }
        self.run(env, entry, dest_entry);
    }

    fn run(&mut self, env: CloneEnv<'_>, start: BlockId, dest_start: BlockId) {
        assert!(
            !self.state.started,
            "cloner already ran (cloning `{}` again)",
            env.src.name
        );
        self.state.started = true;

        let Self { rules, state } = self;
        let CloneEnv {
            pool,
            scopes,
            src,
            dest,
            in_place,
        } = env;

        // Undefined sentinels are re-created with their types remapped.
        let mut undefs: Vec<(Idx, ValueId)> = src.undefs().collect();
        undefs.sort_unstable_by_key(|&(_, v)| v);
        for (ty, v) in undefs {
            let ty = rules.remap_type(pool, ty);
            let new = dest.undef(ty);
            state.values.entry(v).or_insert(new);
        }
        state.blocks.insert(start, dest_start);

        let mut cx = CloneCx {
            pool,
            scopes,
            src,
            dest,
            state,
            in_place,
            block: dest_start,
            loc: SourceLoc::UNKNOWN,
            scope: None,
            phase: Phase::Body,
        };
        clone_params(rules, &mut cx, start, dest_start);

        // Phase 1: discover blocks, clone bodies.
        let mut stack = vec![start];
        while let Some(block) = stack.pop() {
            cx.state.preorder.push(block);
            cx.block = cx.lookup_block(block);
            tracing::trace!(src = %block, dest = %cx.block, "cloning block");

            for &inst in src.block_insts(block) {
                if !src.kind(inst).is_terminator() {
                    clone_inst(rules, &mut cx, inst);
                }
            }
            let tail = cx.block;
            cx.state.tails.insert(block, tail);

            let mut after = tail;
            let mut fresh: SmallVec<[BlockId; 4]> = SmallVec::new();
            for succ in src.successors(block) {
                if cx.state.blocks.contains_key(&succ) {
                    continue;
                }
                let new = cx.dest.create_block_after(after);
                after = new;
                cx.state.blocks.insert(succ, new);
                clone_params(rules, &mut cx, succ, new);
                fresh.push(succ);
            }
            stack.extend(fresh.into_iter().rev());
        }

        // Phase 2: terminators, in discovery order.
        cx.phase = Phase::Terminators;
        let order = cx.state.preorder.clone();
        for block in order {
            let Some(term) = src.terminator(block) else {
                continue;
            };
            cx.block = cx.state.tails[&block];
            clone_inst(rules, &mut cx, term);
        }

        drop_default_args(&mut cx);
        trim_after_unreachable(&mut cx);
    }
}

fn drop_default_args(cx: &mut CloneCx<'_>) {
    for (block, operand) in std::mem::take(&mut cx.state.default_args) {
        let [param] = *cx.dest.block_params(block) else {
            continue;
        };
        tracing::debug!(block = %block, param = %param, operand = %operand, "dropping ownership default argument");
        cx.dest.replace_all_uses(param, operand);
        cx.dest.erase_block_param(block, 0);
    }
}

fn trim_after_unreachable(cx: &mut CloneCx<'_>) {
    for block in std::mem::take(&mut cx.state.unreachable_blocks) {
        let insts = cx.dest.block_insts(block).to_vec();
        let Some(pos) = insts
            .iter()
            .position(|&i| matches!(cx.dest.kind(i), InstKind::Unreachable))
        else {
            continue;
        };
        let dead = &insts[pos + 1..];
        tracing::debug!(block = %block, count = dead.len(), "trimming code after unreachable");
        for &inst in dead.iter().rev() {
            let results = cx.dest.inst(inst).results.clone();
            for r in results {
                if cx.dest.has_uses(r) {
                    let ty = cx.dest.value_type(r);
                    let undef = cx.dest.undef(ty);
                    cx.dest.replace_all_uses(r, undef);
                }
            }
            cx.dest.erase_inst(inst);
        }
    }
}

// ── Whole functions ─────────────────────────────────────────────────

/// Duplicate `func` under `new_name` and register it with the module.
///
/// # Panics
/// Panics if `new_name` is taken.
pub fn clone_function(
    module: &mut Module,
    func: FuncId,
    new_name: impl Into<String>,
    notifier: &mut dyn FunctionNotifier,
) -> FuncId {
    let src = module.functions.get(func);
    let mut copy = Function::new(new_name, src.ty.clone())
        .with_linkage(src.linkage)
        .in_module(src.module)
        .serialized(src.serialized)
        .with_ownership(src.has_ownership);
    copy.scope = src.scope;
    let entry_params: Option<Vec<(Idx, OwnershipKind)>> = src.entry_block().map(|entry| {
        src.block_params(entry)
            .iter()
            .map(|&p| (src.value_type(p), src.value_ownership(p)))
            .collect()
    });

    let new_id = module.add_function(copy, notifier);
    if let Some(params) = entry_params {
        let (src, dest) = module.functions.pair_mut(func, new_id);
        let dest_entry = dest.create_block();
        let args: Vec<ValueId> = params
            .into_iter()
            .map(|(ty, own)| dest.add_block_param(dest_entry, ty, own))
            .collect();
        RegionCloner::new(IdentityRules).clone_function_body(
            CloneEnv {
                pool: &mut module.pool,
                scopes: &mut module.scopes,
                src: &*src,
                dest,
                in_place: false,
            },
            dest_entry,
            &args,
        );
    }
    tracing::debug!(from = %func, to = %new_id, "cloned function");
    new_id
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for concise assertions")]
mod tests;
