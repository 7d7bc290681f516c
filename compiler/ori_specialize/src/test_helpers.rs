//! Shared fixtures for unit tests. Only compiled in test builds.

use ori_ssa::{
    BlockId, FuncId, Function, FunctionBuilder, Module, NoopNotifier, OwnershipKind,
    ParamConvention, ResultConvention, SilFunctionType, SilParam, SilResult, ValueId,
};
use ori_types::{GenericSignature, Idx, Pool};

/// Non-generic function taking trivial direct params and returning `ret`
/// directly, with an entry block carrying the params.
pub(crate) fn make_func(name: &str, params: &[Idx], ret: Idx) -> Function {
    let ty = SilFunctionType::new(
        GenericSignature::default(),
        params
            .iter()
            .map(|&t| SilParam::new(t, ParamConvention::DirectUnowned))
            .collect(),
        vec![SilResult::new(ret, ResultConvention::Unowned)],
    );
    let mut func = Function::new(name, ty);
    let entry = func.create_block();
    for &p in params {
        func.add_block_param(entry, p, OwnershipKind::None);
    }
    func
}

/// `bb0(x, c) -> cond_br c, bb1, bb2`; `bb1 -> br bb3(x)`;
/// `bb2 -> br bb3(0)`; `bb3(m) -> return m`.
pub(crate) fn diamond(pool: &mut Pool, name: &str) -> (Function, [BlockId; 4]) {
    let mut func = make_func(name, &[Idx::INT64, Idx::BOOL], Idx::INT64);
    let bb0 = BlockId::new(0);
    let (x, c) = (func.block_params(bb0)[0], func.block_params(bb0)[1]);
    let mut fb = FunctionBuilder::new(pool, &mut func);
    let bb1 = fb.create_block();
    let bb2 = fb.create_block();
    let bb3 = fb.create_block();
    let m = fb.add_block_param(bb3, Idx::INT64);

    fb.position_at_end(bb0);
    fb.cond_br(c, bb1, vec![], bb2, vec![]);
    fb.position_at_end(bb1);
    fb.br(bb3, vec![x]);
    fb.position_at_end(bb2);
    let zero = fb.integer_literal(Idx::INT64, 0);
    fb.br(bb3, vec![zero]);
    fb.position_at_end(bb3);
    fb.return_(m);

    (func, [bb0, bb1, bb2, bb3])
}

pub(crate) fn empty_module() -> Module {
    Module::new(Pool::new())
}

/// Instruction mnemonics of `func` in layout order.
pub(crate) fn inst_names(func: &Function) -> Vec<&'static str> {
    func.insts_in_layout_order()
        .into_iter()
        .map(|i| func.kind(i).name())
        .collect()
}

/// Declaration with the given signature and no body.
pub(crate) fn declare(
    name: &str,
    generic_sig: GenericSignature,
    params: &[(Idx, ParamConvention)],
    results: &[(Idx, ResultConvention)],
) -> Function {
    let ty = SilFunctionType::new(
        generic_sig,
        params.iter().map(|&(t, c)| SilParam::new(t, c)).collect(),
        results.iter().map(|&(t, c)| SilResult::new(t, c)).collect(),
    );
    Function::new(name, ty)
}

/// `struct Pair { a: Int64, b: Int64 }`, public unless `private`.
pub(crate) fn pair_struct(pool: &mut Pool, private: bool) -> Idx {
    let mut decl = ori_types::NominalDecl::new(
        if private { "Secret" } else { "Pair" },
        ori_types::NominalKind::Struct,
        ori_types::ModuleId::MAIN,
    )
    .with_fields([Idx::INT64, Idx::INT64]);
    if !private {
        decl = decl.public();
    }
    let id = pool.registry_mut().add_nominal(decl);
    pool.nominal(id, &[])
}

/// A public class with no fields.
pub(crate) fn class_type(pool: &mut Pool, name: &str) -> Idx {
    let decl = ori_types::NominalDecl::new(
        name,
        ori_types::NominalKind::Class,
        ori_types::ModuleId::MAIN,
    )
    .public();
    let id = pool.registry_mut().add_nominal(decl);
    pool.nominal(id, &[])
}

/// Register a function generic over one parameter with an empty entry
/// block. Returns its id and the entry arguments.
pub(crate) fn generic_fn(
    module: &mut Module,
    name: &str,
    params: &[(Idx, ParamConvention)],
    results: &[(Idx, ResultConvention)],
    ossa: bool,
) -> (FuncId, Vec<ValueId>) {
    let func = declare(name, GenericSignature::with_params(1), params, results).with_ownership(ossa);
    let id = module.add_function(func, &mut NoopNotifier);
    let func = module.functions.get_mut(id);
    let entry = func.create_block();
    let tys = func.ty.entry_arg_types(&mut module.pool);
    let owns = func.ty.entry_arg_ownership();
    let args = tys
        .into_iter()
        .zip(owns)
        .map(|(ty, own)| func.add_block_param(entry, ty, if ossa { own } else { OwnershipKind::None }))
        .collect();
    (id, args)
}

/// Builder positioned at the end of `id`'s entry block.
pub(crate) fn entry_builder(module: &mut Module, id: FuncId) -> FunctionBuilder<'_> {
    let Module {
        pool, functions, ..
    } = module;
    let func = functions.get_mut(id);
    let entry = func.entry_block().unwrap();
    let mut fb = FunctionBuilder::new(pool, func);
    fb.position_at_end(entry);
    fb
}
