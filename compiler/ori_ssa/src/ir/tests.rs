use pretty_assertions::assert_eq;
use smallvec::smallvec;

use crate::test_helpers::{b, v};

use super::*;

#[test]
fn apply_operands_put_callee_first() {
    let kind = InstKind::Apply {
        callee: v(7),
        subs: SubstitutionMap::empty(),
        args: vec![v(1), v(2)],
    };
    assert_eq!(kind.operands().as_slice(), &[v(7), v(1), v(2)]);
    assert!(kind.is_apply_site());
    assert!(!kind.is_terminator());
}

#[test]
fn map_operands_matches_operand_order() {
    let mut kind = InstKind::CondBr {
        cond: v(0),
        then_dest: b(1),
        then_args: vec![v(1)],
        else_dest: b(2),
        else_args: vec![v(2), v(3)],
    };
    let before = kind.operands();
    kind.map_operands(|x| ValueId::new(x.raw() + 10));
    let after = kind.operands();
    assert_eq!(before.len(), after.len());
    for (old, new) in before.iter().zip(&after) {
        assert_eq!(new.raw(), old.raw() + 10);
    }
}

#[test]
fn switch_enum_successors_include_default() {
    let kind = InstKind::SwitchEnum {
        operand: v(0),
        cases: vec![(0, b(1)), (1, b(2))],
        default: Some(b(3)),
    };
    let expected: SmallVec<[BlockId; 4]> = smallvec![b(1), b(2), b(3)];
    assert_eq!(kind.successors(), expected);
    assert!(kind.is_terminator());
    assert_eq!(kind.branch_args().len(), 3);
    assert!(kind.branch_args().iter().all(|args| args.is_empty()));
}

#[test]
fn non_terminators_have_no_successors() {
    let kind = InstKind::Load {
        addr: v(0),
        qualifier: LoadQualifier::Take,
    };
    assert!(kind.successors().is_empty());
    assert!(kind.branch_args().is_empty());
}

#[test]
fn cost_separates_projections_from_calls() {
    let extract = InstKind::StructExtract {
        operand: v(0),
        field: 1,
    };
    let call = InstKind::Apply {
        callee: v(0),
        subs: SubstitutionMap::empty(),
        args: vec![],
    };
    let cast = InstKind::UnconditionalCheckedCast {
        operand: v(0),
        ty: Idx::INT64,
    };
    assert_eq!(extract.cost(), InstCost::Free);
    assert_eq!(call.cost(), InstCost::Expensive);
    assert_eq!(cast.cost(), InstCost::Expensive);
    assert_eq!(InstKind::IntegerLiteral { value: 3 }.cost(), InstCost::Free);
}

#[test]
fn foldable_when_trivial() {
    assert!(InstKind::CopyValue { operand: v(0) }.is_foldable_when_trivial());
    assert!(InstKind::DestroyAddr { addr: v(0) }.is_foldable_when_trivial());
    assert!(!InstKind::BeginBorrow { operand: v(0) }.is_foldable_when_trivial());
}

#[test]
fn enum_without_payload_has_no_operands() {
    let kind = InstKind::Enum {
        case: 0,
        payload: None,
    };
    assert!(kind.operands().is_empty());
}

#[test]
fn apply_parts_of_try_apply() {
    let kind = InstKind::TryApply {
        callee: v(4),
        subs: SubstitutionMap::empty(),
        args: vec![v(5)],
        normal: b(1),
        error: b(2),
    };
    let (callee, subs, args) = kind.apply_parts().unwrap_or_else(|| panic!("not an apply"));
    assert_eq!(callee, v(4));
    assert!(subs.is_empty());
    assert_eq!(args, &[v(5)]);
    assert_eq!(kind.name(), "try_apply");
}

#[test]
fn map_blocks_rewrites_every_successor() {
    let mut kind = InstKind::TryApply {
        callee: v(0),
        subs: SubstitutionMap::empty(),
        args: vec![],
        normal: b(1),
        error: b(2),
    };
    kind.map_blocks(|x| BlockId::new(x.raw() * 10));
    let expected: SmallVec<[BlockId; 4]> = smallvec![b(10), b(20)];
    assert_eq!(kind.successors(), expected);
}
