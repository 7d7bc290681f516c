//! CFG utilities shared by the verifier, the cloner and the specializer.

use rustc_hash::FxHashSet;

use crate::function::Function;
use crate::ids::BlockId;

/// Distinct predecessors of each block, indexed by block index.
pub fn compute_predecessors(func: &Function) -> Vec<Vec<BlockId>> {
    let mut predecessors: Vec<Vec<BlockId>> = vec![Vec::new(); func.block_count()];
    for &block in func.layout() {
        let mut seen = FxHashSet::default();
        for succ in func.successors(block) {
            if succ.index() < predecessors.len() && seen.insert(succ) {
                predecessors[succ.index()].push(block);
            }
        }
    }
    predecessors
}

/// Depth-first preorder from the entry block.
///
/// Successors are visited in terminator order, which makes the order
/// deterministic for a given CFG.
pub fn compute_preorder(func: &Function) -> Vec<BlockId> {
    let Some(entry) = func.entry_block() else {
        return Vec::new();
    };
    let mut visited = vec![false; func.block_count()];
    let mut order = Vec::with_capacity(func.block_count());
    let mut stack = vec![entry];
    while let Some(block) = stack.pop() {
        if std::mem::replace(&mut visited[block.index()], true) {
            continue;
        }
        order.push(block);
        for succ in func.successors(block).into_iter().rev() {
            if !visited[succ.index()] {
                stack.push(succ);
            }
        }
    }
    order
}

/// Postorder from the entry block, visiting only reachable blocks.
///
/// Iterative DFS with an explicit stack.
pub fn compute_postorder(func: &Function) -> Vec<BlockId> {
    let Some(entry) = func.entry_block() else {
        return Vec::new();
    };
    let n = func.block_count();
    let mut visited = vec![false; n];
    let mut postorder = Vec::with_capacity(n);

    // (block, children_processed)
    let mut stack: Vec<(BlockId, bool)> = vec![(entry, false)];

    while let Some(&mut (block, ref mut children_done)) = stack.last_mut() {
        if *children_done {
            postorder.push(block);
            stack.pop();
            continue;
        }
        *children_done = true;

        if visited[block.index()] {
            stack.pop();
            continue;
        }
        visited[block.index()] = true;

        for succ in func.successors(block) {
            if !visited[succ.index()] {
                stack.push((succ, false));
            }
        }
    }

    postorder
}

/// Dominator tree (Cooper-Harvey-Kennedy).
///
/// Works on reverse postorder; converges in a handful of iterations for
/// reducible CFGs.
pub struct DominatorTree {
    /// `idom[entry] == Some(entry)`; unreachable blocks are `None`.
    idom: Vec<Option<usize>>,
}

impl DominatorTree {
    pub fn build(func: &Function) -> Self {
        let n = func.block_count();
        let Some(entry) = func.entry_block() else {
            return Self { idom: vec![None; n] };
        };

        let preds = compute_predecessors(func);
        let mut rpo = compute_postorder(func);
        rpo.reverse();

        let mut rpo_pos = vec![usize::MAX; n];
        for (pos, &block) in rpo.iter().enumerate() {
            rpo_pos[block.index()] = pos;
        }

        let entry = entry.index();
        let mut idom: Vec<Option<usize>> = vec![None; n];
        idom[entry] = Some(entry);

        let mut changed = true;
        while changed {
            changed = false;
            for &block in &rpo[1..] {
                let b = block.index();
                let mut processed = preds[b]
                    .iter()
                    .map(|p| p.index())
                    .filter(|&p| idom[p].is_some());
                let Some(first) = processed.next() else {
                    continue;
                };
                let new_idom =
                    processed.fold(first, |acc, p| Self::intersect(p, acc, &idom, &rpo_pos));
                if idom[b] != Some(new_idom) {
                    idom[b] = Some(new_idom);
                    changed = true;
                }
            }
        }

        Self { idom }
    }

    /// Whether `block` is reachable from the entry.
    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.idom.get(block.index()).is_some_and(Option::is_some)
    }

    /// Does block `a` dominate block `b`? A block dominates itself.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let a = a.index();
        let mut current = b.index();
        loop {
            if current == a {
                return true;
            }
            match self.idom.get(current).copied().flatten() {
                Some(dom) if dom != current => current = dom,
                _ => return false,
            }
        }
    }

    /// Immediate dominator of `block`; `None` for the entry and for
    /// unreachable blocks.
    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        match self.idom.get(block.index()).copied().flatten() {
            Some(dom) if dom != block.index() => Some(BlockId::from_index(dom)),
            _ => None,
        }
    }

    /// CHK intersect: walk two fingers upward until they meet.
    fn intersect(mut a: usize, mut b: usize, idom: &[Option<usize>], rpo_pos: &[usize]) -> usize {
        while a != b {
            while rpo_pos[a] > rpo_pos[b] {
                let Some(next) = idom[a] else {
                    debug_assert!(false, "intersect: broken idom chain at {a}");
                    return a;
                };
                a = next;
            }
            while rpo_pos[b] > rpo_pos[a] {
                let Some(next) = idom[b] else {
                    debug_assert!(false, "intersect: broken idom chain at {b}");
                    return b;
                };
                b = next;
            }
        }
        a
    }
}

#[cfg(test)]
mod tests;
