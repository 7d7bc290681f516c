//! Shared fixtures for specialization tests.

#![allow(dead_code, reason = "not every test file uses every fixture")]

use ori_specialize::{GenericSpecializer, SpecializationContext, SpecializeConfig};
use ori_ssa::{
    FuncId, Function, FunctionBuilder, InstId, Module, NoopNotifier, OwnershipKind,
    ParamConvention, ResultConvention, SilFunctionType, SilParam, SilResult, ValueId,
};
use ori_types::{GenericSignature, Idx, Pool, SubstitutionMap};

pub fn module() -> Module {
    Module::new(Pool::new())
}

pub fn specializer() -> GenericSpecializer {
    ori_specialize::init_tracing();
    GenericSpecializer::new(SpecializeConfig::default().verify(true))
}

fn signature(
    generic_sig: GenericSignature,
    params: &[(Idx, ParamConvention)],
    results: &[(Idx, ResultConvention)],
) -> SilFunctionType {
    SilFunctionType::new(
        generic_sig,
        params.iter().map(|&(t, c)| SilParam::new(t, c)).collect(),
        results.iter().map(|&(t, c)| SilResult::new(t, c)).collect(),
    )
}

/// Add a function with an empty entry block carrying its arguments.
pub fn define(
    module: &mut Module,
    name: &str,
    generic_sig: GenericSignature,
    params: &[(Idx, ParamConvention)],
    results: &[(Idx, ResultConvention)],
) -> (FuncId, Vec<ValueId>) {
    let func = Function::new(name, signature(generic_sig, params, results));
    let id = module.add_function(func, &mut NoopNotifier);
    let func = module.functions.get_mut(id);
    let entry = func.create_block();
    let tys = func.ty.entry_arg_types(&mut module.pool);
    let args = tys
        .into_iter()
        .map(|ty| func.add_block_param(entry, ty, OwnershipKind::None))
        .collect();
    (id, args)
}

/// A function generic over one parameter `T`.
pub fn define_generic(
    module: &mut Module,
    name: &str,
    params: &[(Idx, ParamConvention)],
    results: &[(Idx, ResultConvention)],
) -> (FuncId, Vec<ValueId>) {
    define(module, name, GenericSignature::with_params(1), params, results)
}

pub fn param_t(module: &mut Module) -> Idx {
    module.pool.generic_param(0, 0)
}

/// Builder positioned at the end of `id`'s entry block.
pub fn entry_builder(module: &mut Module, id: FuncId) -> FunctionBuilder<'_> {
    let Module {
        pool, functions, ..
    } = module;
    let func = functions.get_mut(id);
    let entry = func.entry_block().unwrap();
    let mut fb = FunctionBuilder::new(pool, func);
    fb.position_at_end(entry);
    fb
}

pub fn fn_type(module: &mut Module, f: FuncId) -> Idx {
    let Module {
        pool, functions, ..
    } = module;
    functions.get(f).ty.lowered_type(pool)
}

pub fn bind(module: &Module, replacement: Idx) -> SubstitutionMap {
    SubstitutionMap::from_replacements(
        &module.pool,
        GenericSignature::with_params(1),
        vec![replacement],
    )
}

/// `main() -> ty` returning `callee<ty>(7)`.
pub fn call_direct(module: &mut Module, name: &str, callee: FuncId, ty: Idx) -> (FuncId, InstId) {
    let (main, _) = define(
        module,
        name,
        GenericSignature::default(),
        &[],
        &[(ty, ResultConvention::Unowned)],
    );
    let fn_ty = fn_type(module, callee);
    let subs = bind(module, ty);
    let mut fb = entry_builder(module, main);
    let x = fb.integer_literal(ty, 7);
    let f = fb.function_ref(callee, fn_ty);
    let r = fb.apply(f, subs, vec![x], ty);
    fb.return_(r);
    let site = fb.func().defining_inst(r).unwrap();
    (main, site)
}

/// `main()` calling `callee<Int64>(r, p)` through stack slots.
pub fn call_indirect(module: &mut Module, name: &str, callee: FuncId) -> (FuncId, InstId) {
    let (main, _) = define(
        module,
        name,
        GenericSignature::default(),
        &[],
        &[(Idx::UNIT, ResultConvention::Unowned)],
    );
    let fn_ty = fn_type(module, callee);
    let subs = bind(module, Idx::INT64);
    let mut fb = entry_builder(module, main);
    let x = fb.integer_literal(Idx::INT64, 7);
    let p = fb.alloc_stack(Idx::INT64);
    fb.store(x, p, true);
    let r = fb.alloc_stack(Idx::INT64);
    let f = fb.function_ref(callee, fn_ty);
    let call = fb.apply(f, subs, vec![r, p], Idx::UNIT);
    fb.dealloc_stack(r);
    fb.dealloc_stack(p);
    fb.return_(call);
    let site = fb.func().defining_inst(call).unwrap();
    (main, site)
}

/// Instruction mnemonics per block, in layout order.
pub fn shape(func: &Function) -> Vec<Vec<&'static str>> {
    func.layout()
        .iter()
        .map(|&b| {
            func.block_insts(b)
                .iter()
                .map(|&i| func.kind(i).name())
                .collect()
        })
        .collect()
}

pub fn names(func: &Function) -> Vec<&'static str> {
    shape(func).into_iter().flatten().collect()
}

/// Specialize `roots`, then every function they produce, until no new
/// functions appear. Returns the number of rounds.
pub fn run_to_fixpoint(
    module: &mut Module,
    cx: &mut SpecializationContext,
    roots: &[FuncId],
    max_rounds: usize,
) -> usize {
    let specializer = specializer();
    let mut work: Vec<FuncId> = roots.to_vec();
    let mut rounds = 0;
    while !work.is_empty() {
        rounds += 1;
        assert!(rounds <= max_rounds, "specialization did not converge");
        for func in std::mem::take(&mut work) {
            specializer.specialize_calls_in(module, cx, func, &mut NoopNotifier);
        }
        work = cx.take_new_functions().into_iter().map(|(_, s)| s).collect();
    }
    rounds
}
