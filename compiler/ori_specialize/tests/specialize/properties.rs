//! Whole-engine properties: clone round-trips, deterministic output,
//! cache idempotence and termination on recursive generics.

use ori_specialize::{clone_function, SpecializationContext};
use ori_ssa::{
    verify_function, FuncId, Module, NoopNotifier, ParamConvention as PC, ResultConvention as RC,
};
use ori_types::{GenericSignature, Idx, SubstitutionMap};
use pretty_assertions::assert_eq;

use crate::common::{
    call_direct, call_indirect, define, define_generic, entry_builder, fn_type, module, param_t,
    run_to_fixpoint, shape, specializer,
};

/// `abs(x) = if x < 0 { 0 - x } else { x }`.
fn abs(module: &mut Module) -> FuncId {
    let (f, args) = define(
        module,
        "abs",
        GenericSignature::default(),
        &[(Idx::INT64, PC::DirectUnowned)],
        &[(Idx::INT64, RC::Unowned)],
    );
    let x = args[0];
    let mut fb = entry_builder(module, f);
    let neg = fb.create_block();
    let done = fb.create_block();
    let r = fb.add_block_param(done, Idx::INT64);
    let zero = fb.integer_literal(Idx::INT64, 0);
    let lt = fb.builtin(ori_ssa::BuiltinOp::CmpLt, vec![x, zero], Idx::BOOL);
    fb.cond_br(lt, neg, vec![], done, vec![x]);
    fb.position_at_end(neg);
    let negated = fb.builtin(ori_ssa::BuiltinOp::Sub, vec![zero, x], Idx::INT64);
    fb.br(done, vec![negated]);
    fb.position_at_end(done);
    fb.return_(r);
    f
}

// ── Round trip ──────────────────────────────────────────────────────

#[test]
fn identity_clone_round_trips() {
    let mut module = module();
    let f = abs(&mut module);

    let copy = clone_function(&mut module, f, "abs_copy", &mut NoopNotifier);
    let copy_of_copy = clone_function(&mut module, copy, "abs_copy2", &mut NoopNotifier);

    let original = shape(module.functions.get(f));
    assert_eq!(shape(module.functions.get(copy)), original);
    assert_eq!(shape(module.functions.get(copy_of_copy)), original);
    for id in [copy, copy_of_copy] {
        let func = module.functions.get(id);
        assert_eq!(func.ty, module.functions.get(f).ty);
        assert_eq!(verify_function(func), Ok(()));
    }
}

// ── Determinism ─────────────────────────────────────────────────────

fn specialize_program() -> (Vec<String>, Vec<Vec<Vec<&'static str>>>) {
    let mut module = module();
    let t = param_t(&mut module);
    let (id, args) = define_generic(&mut module, "id", &[(t, PC::IndirectIn)], &[(t, RC::Indirect)]);
    {
        let mut fb = entry_builder(&mut module, id);
        fb.copy_addr(args[1], args[0], true, true);
        let unit = fb.unit();
        fb.return_(unit);
    }
    let (pass, pass_args) = define_generic(&mut module, "pass", &[(t, PC::DirectOwned)], &[(t, RC::Owned)]);
    entry_builder(&mut module, pass).return_(pass_args[0]);
    let (a, _) = call_indirect(&mut module, "a", id);
    let (b, _) = call_direct(&mut module, "b", pass, Idx::BOOL);
    let (c, _) = call_direct(&mut module, "c", pass, Idx::INT64);
    let mut cx = SpecializationContext::new();

    run_to_fixpoint(&mut module, &mut cx, &[a, b, c], 4);

    let names = cx.cache.entries().into_iter().map(|(n, _)| n.to_owned()).collect();
    let shapes = module
        .functions
        .iter()
        .map(|(_, func)| shape(func))
        .collect();
    (names, shapes)
}

#[test]
fn specialization_is_deterministic() {
    let (names, shapes) = specialize_program();
    assert_eq!(names, vec!["$s2idTg5Si_", "$s4passTg5Sb_", "$s4passTg5Si_"]);
    for _ in 0..3 {
        assert_eq!(specialize_program(), (names.clone(), shapes.clone()));
    }
}

// ── Cache ───────────────────────────────────────────────────────────

#[test]
fn repeated_requests_reuse_one_function() {
    let mut module = module();
    let t = param_t(&mut module);
    let (pass, args) = define_generic(&mut module, "pass", &[(t, PC::DirectOwned)], &[(t, RC::Owned)]);
    entry_builder(&mut module, pass).return_(args[0]);
    let callers: Vec<FuncId> = (0..4)
        .map(|i| call_direct(&mut module, &format!("caller{i}"), pass, Idx::INT64).0)
        .collect();
    let before = module.functions.len();
    let mut cx = SpecializationContext::new();
    let specializer = specializer();

    let mut targets = Vec::new();
    for &caller in &callers {
        assert_eq!(specializer.specialize_calls_in(&mut module, &mut cx, caller, &mut NoopNotifier), 1);
        let func = module.functions.get(caller);
        let refs: Vec<FuncId> = func
            .insts_in_layout_order()
            .into_iter()
            .filter_map(|i| match func.kind(i) {
                ori_ssa::InstKind::FunctionRef { func } => Some(*func),
                _ => None,
            })
            .collect();
        targets.extend(refs);
    }

    assert_eq!(module.functions.len(), before + 1);
    assert!(targets.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(cx.stats.created, 1);
    assert_eq!(cx.stats.reused, 3);

    // A caller that is already specialized has nothing left to do.
    assert_eq!(specializer.specialize_calls_in(&mut module, &mut cx, callers[0], &mut NoopNotifier), 0);
    assert_eq!(cx.cache.len(), 1);
}

// ── Termination ─────────────────────────────────────────────────────

/// `rec<T>` calling itself with its own parameter.
fn self_recursive(module: &mut Module, param: PC, result: RC) -> FuncId {
    let t = param_t(module);
    let (f, args) = define_generic(module, "rec", &[(t, param)], &[(t, result)]);
    let ty = module.functions.get(f).ty.clone();
    let fn_ty = fn_type(module, f);
    let result_ty = ty.direct_result_type(&mut module.pool);
    let forwarding = SubstitutionMap::forwarding(&mut module.pool, &ty.generic_sig);
    let mut fb = entry_builder(module, f);
    let callee = fb.function_ref(f, fn_ty);
    let r = fb.apply(callee, forwarding, args, result_ty);
    fb.return_(r);
    f
}

#[test]
fn direct_self_recursion_terminates() {
    let mut module = module();
    let rec = self_recursive(&mut module, PC::DirectOwned, RC::Owned);
    let (main, _) = call_direct(&mut module, "main", rec, Idx::INT64);
    let mut cx = SpecializationContext::new();

    let rounds = run_to_fixpoint(&mut module, &mut cx, &[main], 4);

    assert_eq!(rounds, 2);
    assert_eq!(cx.stats.created, 1);
}

#[test]
fn indirect_self_recursion_terminates() {
    let mut module = module();
    let rec = self_recursive(&mut module, PC::IndirectIn, RC::Indirect);
    let (main, _) = call_indirect(&mut module, "main", rec);
    let mut cx = SpecializationContext::new();

    let rounds = run_to_fixpoint(&mut module, &mut cx, &[main], 4);

    assert_eq!(rounds, 2);
    assert_eq!(cx.stats.created, 1);
    assert_eq!(cx.stats.reused, 1);
}

#[test]
fn mutual_recursion_terminates() {
    let mut module = module();
    let t = param_t(&mut module);
    let (even, even_args) = define_generic(&mut module, "even", &[(t, PC::IndirectIn)], &[(t, RC::Indirect)]);
    let (odd, odd_args) = define_generic(&mut module, "odd", &[(t, PC::IndirectIn)], &[(t, RC::Indirect)]);
    let forwarding = SubstitutionMap::forwarding(&mut module.pool, &GenericSignature::with_params(1));
    for (from, to, args) in [(even, odd, even_args), (odd, even, odd_args)] {
        let fn_ty = fn_type(&mut module, to);
        let mut fb = entry_builder(&mut module, from);
        let callee = fb.function_ref(to, fn_ty);
        let r = fb.apply(callee, forwarding.clone(), args, Idx::UNIT);
        fb.return_(r);
    }
    let (main, _) = call_indirect(&mut module, "main", even);
    let mut cx = SpecializationContext::new();

    let rounds = run_to_fixpoint(&mut module, &mut cx, &[main], 6);

    assert!(rounds <= 4, "{rounds} rounds");
    assert_eq!(cx.stats.created, 2);
    assert_eq!(
        cx.cache.entries().into_iter().map(|(n, _)| n).collect::<Vec<_>>(),
        vec!["$s3oddTg5Si_", "$s4evenTg5Si_"]
    );
    for (_, id) in cx.cache.entries() {
        assert_eq!(verify_function(module.functions.get(id)), Ok(()));
    }
}
