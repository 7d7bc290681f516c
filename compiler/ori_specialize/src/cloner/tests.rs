use ori_ssa::{
    verify_function, BranchWeights, FunctionBuilder, InstKind, NoopNotifier, OwnershipKind,
    ScopeTable,
};
use ori_types::Idx;
use pretty_assertions::assert_eq;

use super::*;
use crate::test_helpers::{diamond, empty_module, inst_names, make_func};

// ── Whole functions ─────────────────────────────────────────────────

#[test]
fn clone_function_copies_body_and_flags() {
    let mut module = empty_module();
    let (func, _) = diamond(&mut module.pool, "f");
    let f = module.add_function(func, &mut NoopNotifier);

    let g = clone_function(&mut module, f, "g", &mut NoopNotifier);

    let (orig, copy) = (module.functions.get(f), module.functions.get(g));
    assert_eq!(copy.name, "g");
    assert_eq!(copy.ty, orig.ty);
    assert_eq!(copy.linkage, orig.linkage);
    assert_eq!(copy.block_count(), orig.block_count());
    // Layout differs (preorder), so compare instruction multisets.
    let sorted = |func| {
        let mut names = inst_names(func);
        names.sort_unstable();
        names
    };
    assert_eq!(sorted(copy), sorted(orig));
    assert_eq!(verify_function(copy), Ok(()));
    assert_eq!(module.functions.lookup("g"), Some(g));
}

#[test]
fn clone_function_of_declaration_has_no_body() {
    let mut module = empty_module();
    let decl = Function::new("ext", make_func("x", &[], Idx::UNIT).ty);
    let f = module.add_function(decl, &mut NoopNotifier);

    let g = clone_function(&mut module, f, "ext2", &mut NoopNotifier);

    assert!(module.functions.get(g).is_declaration());
}

#[test]
fn clone_function_keeps_block_order_of_diamond() {
    let mut module = empty_module();
    let (func, _) = diamond(&mut module.pool, "f");
    let f = module.add_function(func, &mut NoopNotifier);
    let g = clone_function(&mut module, f, "g", &mut NoopNotifier);

    let copy = module.functions.get(g);
    let kinds: Vec<&str> = copy
        .layout()
        .iter()
        .map(|&b| {
            copy.terminator(b)
                .map_or("none", |t| copy.kind(t).name())
        })
        .collect();
    // Preorder layout: entry, then-arm, join, else-arm.
    assert_eq!(kinds, vec!["cond_br", "br", "return", "br"]);
}

// ── Regions ─────────────────────────────────────────────────────────

/// `bb0(c) -> br bb1`; `bb1 -> cond_br c, bb2, bb3`; `bb2 -> br bb4(1)`;
/// `bb3 -> br bb4(2)`; `bb4(m) -> return m`.
fn region_func(pool: &mut Pool) -> (Function, [BlockId; 5]) {
    let mut func = make_func("r", &[Idx::BOOL], Idx::INT64);
    let bb0 = func.entry_block().unwrap();
    let c = func.block_params(bb0)[0];
    let mut fb = FunctionBuilder::new(pool, &mut func);
    let bb1 = fb.create_block();
    let bb2 = fb.create_block();
    let bb3 = fb.create_block();
    let bb4 = fb.create_block();
    let m = fb.add_block_param(bb4, Idx::INT64);

    fb.position_at_end(bb0);
    fb.br(bb1, vec![]);
    fb.position_at_end(bb1);
    fb.cond_br(c, bb2, vec![], bb3, vec![]);
    fb.position_at_end(bb2);
    let one = fb.integer_literal(Idx::INT64, 1);
    fb.br(bb4, vec![one]);
    fb.position_at_end(bb3);
    let two = fb.integer_literal(Idx::INT64, 2);
    fb.br(bb4, vec![two]);
    fb.position_at_end(bb4);
    fb.return_(m);
    (func, [bb0, bb1, bb2, bb3, bb4])
}

#[test]
fn in_place_region_clones_blocks_up_to_exit() {
    let mut pool = Pool::new();
    let mut scopes = ScopeTable::default();
    let (mut func, [_, bb1, bb2, bb3, bb4]) = region_func(&mut pool);
    let before = func.block_count();

    let mut cloner = RegionCloner::new(IdentityRules);
    let start = cloner.clone_region_in_place(&mut pool, &mut scopes, &mut func, bb1, &[bb4]);

    assert_eq!(func.block_count(), before + 3);
    assert_eq!(cloner.preorder(), &[bb1, bb2, bb3]);
    assert_eq!(cloner.block(bb1), Some(start));
    assert_eq!(cloner.block(bb4), Some(bb4));

    // The cloned branches still target the original exit.
    let new_bb2 = cloner.block(bb2).unwrap();
    let term = func.terminator(new_bb2).unwrap();
    assert!(matches!(func.kind(term), InstKind::Br { dest, .. } if *dest == bb4));
    assert_eq!(verify_function(&func), Ok(()));
}

#[test]
fn in_place_region_reuses_outside_values() {
    let mut pool = Pool::new();
    let mut scopes = ScopeTable::default();
    let (mut func, [bb0, bb1, ..]) = region_func(&mut pool);
    let c = func.block_params(bb0)[0];
    let bb4 = BlockId::new(4);

    let mut cloner = RegionCloner::new(IdentityRules);
    let start = cloner.clone_region_in_place(&mut pool, &mut scopes, &mut func, bb1, &[bb4]);

    let term = func.terminator(start).unwrap();
    assert!(matches!(func.kind(term), InstKind::CondBr { cond, .. } if *cond == c));
}

#[test]
fn new_blocks_are_laid_out_after_their_discoverer() {
    let mut pool = Pool::new();
    let mut scopes = ScopeTable::default();
    let (mut func, [_, bb1, bb2, bb3, bb4]) = region_func(&mut pool);

    let mut cloner = RegionCloner::new(IdentityRules);
    let start = cloner.clone_region_in_place(&mut pool, &mut scopes, &mut func, bb1, &[bb4]);

    let get = |b| cloner.block(b).unwrap();
    let layout = func.layout();
    let tail = &layout[layout.len() - 3..];
    assert_eq!(tail, &[start, get(bb2), get(bb3)]);
}

#[derive(Default)]
struct Recorder {
    seen: Vec<bool>,
}

impl CloneRules for Recorder {
    fn visit(&mut self, cx: &mut CloneCx<'_>, inst: InstId) -> Visit {
        self.seen.push(cx.src.kind(inst).is_terminator());
        Visit::Clone
    }
}

#[test]
fn terminators_are_cloned_after_every_body() {
    let mut module = empty_module();
    let (src, _) = diamond(&mut module.pool, "f");
    let mut dest = Function::new("g", src.ty.clone());
    let entry = dest.create_block();
    let args = vec![
        dest.add_block_param(entry, Idx::INT64, OwnershipKind::None),
        dest.add_block_param(entry, Idx::BOOL, OwnershipKind::None),
    ];

    let mut cloner = RegionCloner::new(Recorder::default());
    cloner.clone_function_body(
        CloneEnv {
            pool: &mut module.pool,
            scopes: &mut module.scopes,
            src: &src,
            dest: &mut dest,
            in_place: false,
        },
        entry,
        &args,
    );

    let seen = cloner.into_rules().seen;
    let first_term = seen.iter().position(|&t| t).unwrap_or(seen.len());
    assert!(seen[first_term..].iter().all(|&t| t), "{seen:?}");
    assert_eq!(seen.iter().filter(|&&t| t).count(), 4);
}

struct FoldLiterals {
    to: i64,
}

impl CloneRules for FoldLiterals {
    fn visit(&mut self, cx: &mut CloneCx<'_>, inst: InstId) -> Visit {
        match cx.src.kind(inst) {
            InstKind::IntegerLiteral { .. } => {
                let v = cx.emit_value(
                    InstKind::IntegerLiteral { value: self.to },
                    Idx::INT64,
                    OwnershipKind::None,
                );
                Visit::Fold(smallvec::smallvec![v])
            }
            _ => Visit::Clone,
        }
    }
}

#[test]
fn fold_maps_results_onto_rule_values() {
    let mut module = empty_module();
    let (src, _) = diamond(&mut module.pool, "f");
    let mut dest = Function::new("g", src.ty.clone());
    let entry = dest.create_block();
    let args = vec![
        dest.add_block_param(entry, Idx::INT64, OwnershipKind::None),
        dest.add_block_param(entry, Idx::BOOL, OwnershipKind::None),
    ];

    RegionCloner::new(FoldLiterals { to: 7 }).clone_function_body(
        CloneEnv {
            pool: &mut module.pool,
            scopes: &mut module.scopes,
            src: &src,
            dest: &mut dest,
            in_place: false,
        },
        entry,
        &args,
    );

    let literals: Vec<i64> = dest
        .insts_in_layout_order()
        .into_iter()
        .filter_map(|i| match dest.kind(i) {
            InstKind::IntegerLiteral { value } => Some(*value),
            _ => None,
        })
        .collect();
    assert_eq!(literals, vec![7]);
    assert_eq!(verify_function(&dest), Ok(()));
}

#[test]
#[should_panic(expected = "used before it was mapped")]
fn unmapped_value_panics() {
    let mut pool = Pool::new();
    let mut scopes = ScopeTable::default();
    let (src, [_, bb1, _, _, bb4]) = region_func(&mut pool);
    let mut dest = Function::new("g", src.ty.clone());

    // `bb1` branches on the entry parameter, which nothing maps.
    RegionCloner::new(IdentityRules).clone_region(
        CloneEnv {
            pool: &mut pool,
            scopes: &mut scopes,
            src: &src,
            dest: &mut dest,
            in_place: false,
        },
        bb1,
        &[bb4],
    );
}

#[test]
#[should_panic(expected = "cloner already ran")]
fn cloner_runs_once() {
    let mut pool = Pool::new();
    let mut scopes = ScopeTable::default();
    let (mut func, [_, bb1, _, _, bb4]) = region_func(&mut pool);
    let mut cloner = RegionCloner::new(IdentityRules);
    cloner.clone_region_in_place(&mut pool, &mut scopes, &mut func, bb1, &[bb4]);
    cloner.clone_region_in_place(&mut pool, &mut scopes, &mut func, bb1, &[bb4]);
}

// ── Fix-ups ─────────────────────────────────────────────────────────

#[test]
fn default_argument_is_dropped_when_leaving_ownership_form() {
    let mut pool = Pool::new();
    let mut scopes = ScopeTable::default();
    let mut src = make_func("f", &[], Idx::INT64).with_ownership(true);
    let entry = src.entry_block().unwrap();
    let any = src.add_block_param(entry, Idx::ANY, OwnershipKind::Owned);
    src.ty.params.push(ori_ssa::SilParam::new(
        Idx::ANY,
        ori_ssa::ParamConvention::DirectOwned,
    ));
    let mut fb = FunctionBuilder::new(&mut pool, &mut src);
    let ok = fb.create_block();
    let fail = fb.create_block();
    let n = fb.add_block_param(ok, Idx::INT64);
    let back = fb.func_mut().add_block_param(fail, Idx::ANY, OwnershipKind::Owned);
    fb.position_at_end(entry);
    fb.checked_cast_br(any, Idx::INT64, false, ok, fail, BranchWeights::default());
    fb.position_at_end(ok);
    fb.return_(n);
    fb.position_at_end(fail);
    fb.destroy_value(back);
    let zero = fb.integer_literal(Idx::INT64, 0);
    fb.return_(zero);
    assert_eq!(verify_function(&src), Ok(()));

    let mut dest = Function::new("g", src.ty.clone());
    let dest_entry = dest.create_block();
    let arg = dest.add_block_param(dest_entry, Idx::ANY, OwnershipKind::None);
    let mut cloner = RegionCloner::new(IdentityRules);
    cloner.clone_function_body(
        CloneEnv {
            pool: &mut pool,
            scopes: &mut scopes,
            src: &src,
            dest: &mut dest,
            in_place: false,
        },
        dest_entry,
        &[arg],
    );

    let new_fail = cloner.block(fail).unwrap();
    assert!(dest.block_params(new_fail).is_empty());
    let destroy = dest.block_insts(new_fail)[0];
    assert_eq!(
        dest.kind(destroy),
        &InstKind::DestroyValue { operand: arg }
    );
    assert_eq!(verify_function(&dest), Ok(()));
}

struct TrapOnLiteral;

impl CloneRules for TrapOnLiteral {
    fn visit(&mut self, cx: &mut CloneCx<'_>, inst: InstId) -> Visit {
        if !matches!(cx.src.kind(inst), InstKind::IntegerLiteral { .. }) {
            return Visit::Clone;
        }
        cx.emit(
            InstKind::Builtin {
                op: ori_ssa::BuiltinOp::Trap,
                args: Vec::new(),
            },
            &[(Idx::UNIT, OwnershipKind::None)],
        );
        cx.emit_void(InstKind::Unreachable);
        let undef = cx.dest.undef(Idx::INT64);
        Visit::Fold(smallvec::smallvec![undef])
    }
}

#[test]
fn code_after_mid_block_unreachable_is_trimmed() {
    let mut module = empty_module();
    let (src, [_, _, bb2, _]) = diamond(&mut module.pool, "f");
    let mut dest = Function::new("g", src.ty.clone());
    let entry = dest.create_block();
    let args = vec![
        dest.add_block_param(entry, Idx::INT64, OwnershipKind::None),
        dest.add_block_param(entry, Idx::BOOL, OwnershipKind::None),
    ];

    let mut cloner = RegionCloner::new(TrapOnLiteral);
    cloner.clone_function_body(
        CloneEnv {
            pool: &mut module.pool,
            scopes: &mut module.scopes,
            src: &src,
            dest: &mut dest,
            in_place: false,
        },
        entry,
        &args,
    );

    let new_bb2 = cloner.block(bb2).unwrap();
    let names: Vec<&str> = dest
        .block_insts(new_bb2)
        .iter()
        .map(|&i| dest.kind(i).name())
        .collect();
    assert_eq!(names, vec!["builtin", "unreachable"]);
    assert_eq!(verify_function(&dest), Ok(()));
}
