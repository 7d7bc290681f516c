use pretty_assertions::assert_eq;

use super::*;

fn generic_identity(pool: &mut Pool) -> SilFunctionType {
    let t = pool.generic_param(0, 0);
    SilFunctionType::new(
        GenericSignature::with_params(1),
        vec![SilParam::new(t, ParamConvention::IndirectIn)],
        vec![SilResult::new(t, ResultConvention::Indirect)],
    )
}

#[test]
fn entry_args_put_indirect_results_first() {
    let mut pool = Pool::new();
    let ty = SilFunctionType::new(
        GenericSignature::default(),
        vec![
            SilParam::new(Idx::INT64, ParamConvention::DirectUnowned),
            SilParam::new(Idx::NATIVE_OBJECT, ParamConvention::IndirectInGuaranteed),
        ],
        vec![
            SilResult::new(Idx::BOOL, ResultConvention::Unowned),
            SilResult::new(Idx::FLOAT64, ResultConvention::Indirect),
        ],
    );
    let f64_addr = pool.address(Idx::FLOAT64);
    let obj_addr = pool.address(Idx::NATIVE_OBJECT);
    assert_eq!(
        ty.entry_arg_types(&mut pool),
        vec![f64_addr, Idx::INT64, obj_addr]
    );
    assert_eq!(ty.direct_result_type(&mut pool), Idx::BOOL);
    assert_eq!(
        ty.entry_arg_ownership(),
        vec![OwnershipKind::None, OwnershipKind::None, OwnershipKind::None]
    );
}

#[test]
fn no_direct_results_is_unit() {
    let mut pool = Pool::new();
    let ty = generic_identity(&mut pool);
    assert_eq!(ty.direct_result_type(&mut pool), Idx::UNIT);
    assert_eq!(ty.num_indirect_results(), 1);
}

#[test]
fn substitution_drops_bound_signature() {
    let mut pool = Pool::new();
    let ty = generic_identity(&mut pool);
    assert!(ty.has_type_params(&pool));

    let subs = SubstitutionMap::from_replacements(
        &pool,
        GenericSignature::with_params(1),
        vec![Idx::INT32],
    );
    let concrete = ty.substituted(&mut pool, &subs);
    assert!(!concrete.is_generic());
    assert!(!concrete.has_type_params(&pool));
    assert_eq!(concrete.params[0], SilParam::new(Idx::INT32, ParamConvention::IndirectIn));
}

#[test]
fn lowered_type_is_interned_function() {
    let mut pool = Pool::new();
    let ty = generic_identity(&mut pool);
    let t = pool.generic_param(0, 0);
    let t_addr = pool.address(t);
    let expected = pool.function(&[t_addr, t_addr], Idx::UNIT);
    assert_eq!(ty.lowered_type(&mut pool), expected);
}
