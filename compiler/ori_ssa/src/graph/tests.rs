use pretty_assertions::assert_eq;

use ori_types::{Idx, Pool};

use crate::builder::FunctionBuilder;
use crate::test_helpers::{b, diamond, make_func};

use super::*;

#[test]
fn single_block_self_dominance() {
    let func = make_func(&[], Idx::UNIT);
    let dom = DominatorTree::build(&func);
    assert!(dom.dominates(b(0), b(0)));
    assert_eq!(dom.idom(b(0)), None);
}

#[test]
fn diamond_dominance() {
    let mut pool = Pool::new();
    let (func, [bb0, bb1, bb2, bb3]) = diamond(&mut pool);
    let dom = DominatorTree::build(&func);
    assert!(dom.dominates(bb0, bb3));
    assert!(!dom.dominates(bb1, bb3));
    assert!(!dom.dominates(bb2, bb3));
    assert_eq!(dom.idom(bb3), Some(bb0));
    assert_eq!(dom.idom(bb1), Some(bb0));
}

#[test]
fn diamond_orders() {
    let mut pool = Pool::new();
    let (func, [bb0, bb1, bb2, bb3]) = diamond(&mut pool);
    assert_eq!(compute_preorder(&func), vec![bb0, bb1, bb3, bb2]);
    let post = compute_postorder(&func);
    assert_eq!(post.len(), 4);
    assert_eq!(post.last(), Some(&bb0));
    let preds = compute_predecessors(&func);
    assert_eq!(preds[bb3.index()], vec![bb1, bb2]);
    assert!(preds[bb0.index()].is_empty());
}

#[test]
fn unreachable_block_is_not_dominated() {
    let mut pool = Pool::new();
    let mut func = make_func(&[], Idx::UNIT);
    let mut fb = FunctionBuilder::new(&mut pool, &mut func);
    let dead = fb.create_block();
    fb.position_at_end(b(0));
    fb.unreachable();
    fb.position_at_end(dead);
    fb.unreachable();

    let dom = DominatorTree::build(&func);
    assert!(!dom.is_reachable(dead));
    assert!(!dom.dominates(b(0), dead));
    assert_eq!(compute_preorder(&func), vec![b(0)]);
}

#[test]
fn loop_header_dominates_body() {
    let mut pool = Pool::new();
    let mut func = make_func(&[Idx::BOOL], Idx::UNIT);
    let c = func.block_params(b(0))[0];
    let mut fb = FunctionBuilder::new(&mut pool, &mut func);
    let header = fb.create_block();
    let body = fb.create_block();
    let exit = fb.create_block();
    fb.position_at_end(b(0));
    fb.br(header, vec![]);
    fb.position_at_end(header);
    fb.cond_br(c, body, vec![], exit, vec![]);
    fb.position_at_end(body);
    fb.br(header, vec![]);
    fb.position_at_end(exit);
    let unit = fb.unit();
    fb.return_(unit);

    let dom = DominatorTree::build(&func);
    assert!(dom.dominates(header, body));
    assert!(dom.dominates(header, exit));
    assert_eq!(dom.idom(header), Some(b(0)));
}
