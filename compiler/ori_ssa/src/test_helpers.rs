//! Shared test utilities for the IR model. Only compiled in test builds.

use ori_types::{GenericSignature, Idx, Pool};

use crate::builder::FunctionBuilder;
use crate::func_type::{ParamConvention, ResultConvention, SilFunctionType, SilParam, SilResult};
use crate::function::Function;
use crate::ids::{BlockId, ValueId};
use crate::ownership::OwnershipKind;

/// Shorthand for `ValueId::new(n)`.
pub(crate) fn v(n: u32) -> ValueId {
    ValueId::new(n)
}

/// Shorthand for `BlockId::new(n)`.
pub(crate) fn b(n: u32) -> BlockId {
    BlockId::new(n)
}

/// Non-generic function taking trivial direct params and returning `ret`
/// directly. The entry block exists and carries the params.
pub(crate) fn make_func(params: &[Idx], ret: Idx) -> Function {
    let ty = SilFunctionType::new(
        GenericSignature::default(),
        params
            .iter()
            .map(|&t| SilParam::new(t, ParamConvention::DirectUnowned))
            .collect(),
        vec![SilResult::new(ret, ResultConvention::Unowned)],
    );
    let mut func = Function::new("test", ty);
    let entry = func.create_block();
    for &p in params {
        func.add_block_param(entry, p, OwnershipKind::None);
    }
    func
}

/// `bb0(x, c) -> cond_br c, bb1, bb2`; `bb1 -> br bb3(x)`;
/// `bb2 -> br bb3(0)`; `bb3(m) -> return m`.
pub(crate) fn diamond(pool: &mut Pool) -> (Function, [BlockId; 4]) {
    let mut func = make_func(&[Idx::INT64, Idx::BOOL], Idx::INT64);
    let bb0 = b(0);
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
