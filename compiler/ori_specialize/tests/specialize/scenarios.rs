//! End-to-end scenarios: region cloning, identity specialization, indirect
//! argument conversion and dead-code trimming.

use ori_specialize::{CloneCx, CloneRules, RegionCloner, SpecializationContext, Visit};
use ori_ssa::{
    verify_function, BlockId, InstId, InstKind, NoopNotifier,
    ParamConvention as PC, ResultConvention as RC, SourceLoc,
};
use ori_types::{GenericSignature, Idx};
use pretty_assertions::assert_eq;

use crate::common::{
    call_direct, call_indirect, define, define_generic, entry_builder, module, names, param_t,
    shape, specializer,
};

// ── Region cloning ──────────────────────────────────────────────────

/// Records which instructions the cloner visits, in order.
#[derive(Default)]
struct Recorder {
    visited: Vec<(&'static str, bool)>,
}

impl CloneRules for Recorder {
    fn visit(&mut self, cx: &mut CloneCx<'_>, inst: InstId) -> Visit {
        let kind = cx.src.kind(inst);
        self.visited.push((kind.name(), kind.is_terminator()));
        Visit::Clone
    }
}

#[test]
fn diamond_region_clones_into_the_shared_merge() {
    let mut module = module();
    let (f, args) = define(
        &mut module,
        "pick",
        GenericSignature::default(),
        &[(Idx::INT64, PC::DirectUnowned), (Idx::BOOL, PC::DirectUnowned)],
        &[(Idx::INT64, RC::Unowned)],
    );
    let (x, c) = (args[0], args[1]);
    let [head, then_bb, else_bb, merge] = {
        let mut fb = entry_builder(&mut module, f);
        let head = fb.create_block();
        let then_bb = fb.create_block();
        let else_bb = fb.create_block();
        let merge = fb.create_block();
        let m = fb.add_block_param(merge, Idx::INT64);
        fb.br(head, vec![]);
        fb.position_at_end(head);
        fb.cond_br(c, then_bb, vec![], else_bb, vec![]);
        fb.position_at_end(then_bb);
        fb.br(merge, vec![x]);
        fb.position_at_end(else_bb);
        let zero = fb.integer_literal(Idx::INT64, 0);
        fb.br(merge, vec![zero]);
        fb.position_at_end(merge);
        fb.return_(m);
        [head, then_bb, else_bb, merge]
    };
    let blocks_before = module.functions.get(f).block_count();

    let mut cloner = RegionCloner::new(Recorder::default());
    let new_head = {
        let ori_ssa::Module {
            pool,
            functions,
            scopes,
            ..
        } = &mut module;
        cloner.clone_region_in_place(pool, scopes, functions.get_mut(f), head, &[merge])
    };

    let func = module.functions.get(f);
    assert_eq!(func.block_count(), blocks_before + 3);
    assert_eq!(cloner.preorder(), &[head, then_bb, else_bb]);

    // Both arms still feed the original merge block.
    let new_then = cloner.block(then_bb).unwrap();
    let new_else = cloner.block(else_bb).unwrap();
    assert_eq!(func.successors(new_head).as_slice(), &[new_then, new_else]);
    let term = func.terminator(new_then).unwrap();
    assert_eq!(
        func.kind(term),
        &InstKind::Br {
            dest: merge,
            args: vec![x]
        }
    );
    assert_eq!(func.successors(new_else).as_slice(), &[merge]);
    assert_eq!(cloner.value(x), None);

    // Every terminator is visited after every non-terminator.
    let visited = &cloner.rules().visited;
    let first_term = visited.iter().position(|(_, t)| *t).unwrap();
    assert!(visited[first_term..].iter().all(|(_, t)| *t), "{visited:?}");
    assert_eq!(visited.len(), 4);
    assert_eq!(verify_function(func), Ok(()));
}

#[test]
fn diamond_region_clone_gets_a_fresh_merge_parameter() {
    let mut module = module();
    let (f, args) = define(
        &mut module,
        "pick_then_exit",
        GenericSignature::default(),
        &[(Idx::INT64, PC::DirectUnowned), (Idx::BOOL, PC::DirectUnowned)],
        &[(Idx::INT64, RC::Unowned)],
    );
    let (x, c) = (args[0], args[1]);
    let (head, merge, m, exit) = {
        let mut fb = entry_builder(&mut module, f);
        let head = fb.create_block();
        let then_bb = fb.create_block();
        let else_bb = fb.create_block();
        let merge = fb.create_block();
        let exit = fb.create_block();
        let m = fb.add_block_param(merge, Idx::INT64);
        let r = fb.add_block_param(exit, Idx::INT64);
        fb.br(head, vec![]);
        fb.position_at_end(head);
        fb.cond_br(c, then_bb, vec![], else_bb, vec![]);
        fb.position_at_end(then_bb);
        fb.br(merge, vec![x]);
        fb.position_at_end(else_bb);
        let zero = fb.integer_literal(Idx::INT64, 0);
        fb.br(merge, vec![zero]);
        fb.position_at_end(merge);
        fb.br(exit, vec![m]);
        fb.position_at_end(exit);
        fb.return_(r);
        (head, merge, m, exit)
    };

    let mut cloner = RegionCloner::new(ori_specialize::IdentityRules);
    let ori_ssa::Module {
        pool,
        functions,
        scopes,
        ..
    } = &mut module;
    let func = functions.get_mut(f);
    let new_head = cloner.clone_region_in_place(pool, scopes, func, head, &[exit]);

    let new_merge = cloner.block(merge).unwrap();
    assert_ne!(new_merge, merge);
    let params = func.block_params(new_merge);
    assert_eq!(params.len(), 1);
    let new_m = params[0];
    assert_ne!(new_m, m);
    assert_eq!(cloner.value(m), Some(new_m));
    assert_eq!(func.value_type(new_m), Idx::INT64);

    // Both cloned arms feed the cloned merge; it forwards to the shared exit.
    let arms = func.successors(new_head);
    assert_eq!(arms.len(), 2);
    for arm in arms {
        assert_eq!(func.successors(arm).as_slice(), &[new_merge]);
    }
    let term = func.terminator(new_merge).unwrap();
    assert_eq!(
        func.kind(term),
        &InstKind::Br {
            dest: exit,
            args: vec![new_m]
        }
    );

    let entry = func.entry_block().unwrap();
    let old_br = func.terminator(entry).unwrap();
    func.erase_inst(old_br);
    func.append_inst(
        entry,
        InstKind::Br {
            dest: new_head,
            args: vec![],
        },
        &[],
        SourceLoc::UNKNOWN,
        None,
    );
    assert_eq!(verify_function(func), Ok(()));
}

#[test]
fn redirected_region_clone_verifies() {
    let mut module = module();
    let (f, args) = define(
        &mut module,
        "loop_free",
        GenericSignature::default(),
        &[(Idx::BOOL, PC::DirectUnowned)],
        &[(Idx::INT64, RC::Unowned)],
    );
    let (head, exit) = {
        let mut fb = entry_builder(&mut module, f);
        let head = fb.create_block();
        let exit = fb.create_block();
        let v = fb.add_block_param(exit, Idx::INT64);
        fb.br(head, vec![]);
        fb.position_at_end(head);
        let one = fb.integer_literal(Idx::INT64, 1);
        fb.cond_br(args[0], exit, vec![one], exit, vec![one]);
        fb.position_at_end(exit);
        fb.return_(v);
        (head, exit)
    };

    let mut cloner = RegionCloner::new(ori_specialize::IdentityRules);
    let ori_ssa::Module {
        pool,
        functions,
        scopes,
        ..
    } = &mut module;
    let func = functions.get_mut(f);
    let new_head = cloner.clone_region_in_place(pool, scopes, func, head, &[exit]);
    let entry: BlockId = func.entry_block().unwrap();
    let old_br = func.terminator(entry).unwrap();
    func.erase_inst(old_br);
    func.append_inst(
        entry,
        InstKind::Br {
            dest: new_head,
            args: vec![],
        },
        &[],
        SourceLoc::UNKNOWN,
        None,
    );

    assert_eq!(verify_function(func), Ok(()));
    assert_eq!(
        shape(func),
        vec![
            vec!["br"],
            vec!["integer_literal", "cond_br"],
            vec!["return"],
            vec!["integer_literal", "cond_br"],
        ]
    );
}

// ── Specialization ──────────────────────────────────────────────────

#[test]
fn identity_over_int32_leaves_no_generic_parameter() {
    let mut module = module();
    let t = param_t(&mut module);
    let (id, args) = define_generic(&mut module, "id", &[(t, PC::DirectOwned)], &[(t, RC::Owned)]);
    entry_builder(&mut module, id).return_(args[0]);
    let (main, site) = call_direct(&mut module, "main", id, Idx::INT32);
    let mut cx = SpecializationContext::new();

    let spec = specializer()
        .specialize_call(&mut module, &mut cx, main, site, &mut NoopNotifier)
        .unwrap();

    let spec_fn = module.functions.get(spec);
    assert_eq!(spec_fn.name, "$s2idTg5s5Int32V_");
    assert!(!spec_fn.ty.is_generic());
    let count = u32::try_from(spec_fn.value_count()).unwrap();
    for v in 0..count {
        let ty = spec_fn.value_type(ori_ssa::ValueId::new(v));
        assert!(!module.pool.flags(ty).has_type_params(), "{}", module.pool.format_type(ty));
    }
    assert_eq!(names(spec_fn), vec!["return"]);
}

#[test]
fn indirect_parameter_becomes_one_load_at_the_call_site() {
    let mut module = module();
    let t = param_t(&mut module);
    let (id, args) = define_generic(&mut module, "id", &[(t, PC::IndirectIn)], &[(t, RC::Indirect)]);
    {
        let mut fb = entry_builder(&mut module, id);
        fb.copy_addr(args[1], args[0], true, true);
        let unit = fb.unit();
        fb.return_(unit);
    }
    let (main, site) = call_indirect(&mut module, "main", id);
    let mut cx = SpecializationContext::new();

    let spec = specializer()
        .specialize_call(&mut module, &mut cx, main, site, &mut NoopNotifier)
        .unwrap();

    let spec_fn = module.functions.get(spec);
    assert_eq!(spec_fn.ty.params[0].convention, PC::DirectUnowned);
    assert_eq!(spec_fn.ty.results[0].convention, RC::Unowned);

    let main_fn = module.functions.get(main);
    let loads = names(main_fn).into_iter().filter(|n| *n == "load").count();
    assert_eq!(loads, 1);
    assert_eq!(
        names(main_fn),
        vec![
            "integer_literal",
            "alloc_stack",
            "store",
            "alloc_stack",
            "load",
            "function_ref",
            "apply",
            "store",
            "tuple",
            "dealloc_stack",
            "dealloc_stack",
            "return",
        ]
    );
    assert_eq!(verify_function(main_fn), Ok(()));
}

#[test]
fn code_after_a_failing_cast_is_trimmed() {
    let mut module = module();
    let t = param_t(&mut module);
    let (f, args) = define_generic(
        &mut module,
        "to_int",
        &[(t, PC::DirectOwned)],
        &[(Idx::INT64, RC::Unowned)],
    );
    {
        let mut fb = entry_builder(&mut module, f);
        let v = fb.unconditional_checked_cast(args[0], Idx::INT64);
        let one = fb.integer_literal(Idx::INT64, 1);
        let sum = fb.builtin(ori_ssa::BuiltinOp::Add, vec![v, one], Idx::INT64);
        fb.return_(sum);
    }
    let (main, _) = call_direct(&mut module, "main", f, Idx::BOOL);
    let mut cx = SpecializationContext::new();

    let rewritten = specializer().specialize_calls_in(&mut module, &mut cx, main, &mut NoopNotifier);

    assert_eq!(rewritten, 1);
    let (_, spec) = cx.new_functions[0];
    let spec_fn = module.functions.get(spec);
    assert_eq!(shape(spec_fn), vec![vec!["builtin", "unreachable"]]);
    assert_eq!(verify_function(spec_fn), Ok(()));
}
