//! Structural verifier for function bodies.
//!
//! Checks that every block ends in exactly one terminator, every operand
//! names a live value whose definition dominates the use, branch arguments
//! match destination parameters, and (in ownership SSA) incoming
//! ownership kinds merge with each block parameter's kind.

use smallvec::SmallVec;
use thiserror::Error;

use crate::function::Function;
use crate::graph::DominatorTree;
use crate::ids::{BlockId, InstId, ValueId};
use crate::ir::{InstKind, ValueDef};
use crate::ownership::OwnershipKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("block {block} in `{func}` does not end in a terminator")]
    MissingTerminator { func: String, block: BlockId },
    #[error("terminator {inst} in `{func}` is followed by other instructions in {block}")]
    MisplacedTerminator {
        func: String,
        block: BlockId,
        inst: InstId,
    },
    #[error("{inst} in `{func}` uses {value}, which does not exist")]
    UnknownValue {
        func: String,
        inst: InstId,
        value: ValueId,
    },
    #[error("{inst} in `{func}` uses {value}, defined by an erased instruction")]
    ErasedOperand {
        func: String,
        inst: InstId,
        value: ValueId,
    },
    #[error("{inst} in `{func}` uses {value}, whose definition does not dominate it")]
    NonDominatingOperand {
        func: String,
        inst: InstId,
        value: ValueId,
    },
    #[error("{inst} in `{func}` passes {found} arguments to {dest}, which expects {expected}")]
    BranchArityMismatch {
        func: String,
        inst: InstId,
        dest: BlockId,
        expected: usize,
        found: usize,
    },
    #[error("{inst} in `{func}` passes {incoming} ownership to a {expected} parameter of {dest}")]
    OwnershipConflict {
        func: String,
        inst: InstId,
        dest: BlockId,
        expected: OwnershipKind,
        incoming: OwnershipKind,
    },
    #[error("{inst} in `{func}` branches to {dest}, which is not in the layout")]
    UnknownSuccessor {
        func: String,
        inst: InstId,
        dest: BlockId,
    },
}

/// Verify a function body. Declarations trivially pass.
pub fn verify_function(func: &Function) -> Result<(), VerifyError> {
    if func.is_declaration() {
        return Ok(());
    }
    let verifier = Verifier {
        func,
        dom: DominatorTree::build(func),
        in_layout: {
            let mut in_layout = vec![false; func.block_count()];
            for &b in func.layout() {
                in_layout[b.index()] = true;
            }
            in_layout
        },
    };
    for &block in func.layout() {
        verifier.check_block(block)?;
    }
    Ok(())
}

struct Verifier<'a> {
    func: &'a Function,
    dom: DominatorTree,
    in_layout: Vec<bool>,
}

impl Verifier<'_> {
    fn name(&self) -> String {
        self.func.name.clone()
    }

    fn check_block(&self, block: BlockId) -> Result<(), VerifyError> {
        let insts = self.func.block_insts(block);
        let Some((&last, body)) = insts.split_last() else {
            return Err(VerifyError::MissingTerminator {
                func: self.name(),
                block,
            });
        };
        if let Some(&early) = body.iter().find(|&&i| self.func.kind(i).is_terminator()) {
            return Err(VerifyError::MisplacedTerminator {
                func: self.name(),
                block,
                inst: early,
            });
        }
        if !self.func.kind(last).is_terminator() {
            return Err(VerifyError::MissingTerminator {
                func: self.name(),
                block,
            });
        }
        for (pos, &inst) in insts.iter().enumerate() {
            for value in self.func.kind(inst).operands() {
                self.check_operand(block, pos, inst, value)?;
            }
        }
        self.check_edges(last)
    }

    fn check_operand(
        &self,
        block: BlockId,
        pos: usize,
        inst: InstId,
        value: ValueId,
    ) -> Result<(), VerifyError> {
        if value.index() >= self.func.value_count() {
            return Err(VerifyError::UnknownValue {
                func: self.name(),
                inst,
                value,
            });
        }
        // Dominance is meaningless in unreachable code.
        if !self.dom.is_reachable(block) {
            return Ok(());
        }
        let dominated = match self.func.value(value).def {
            ValueDef::Undef => true,
            ValueDef::Param { block: def_block, .. } => self.dom.dominates(def_block, block),
            ValueDef::Result { inst: def, .. } => {
                let Some(def_block) = self.func.inst(def).block else {
                    return Err(VerifyError::ErasedOperand {
                        func: self.name(),
                        inst,
                        value,
                    });
                };
                if def_block == block {
                    self.func.block_insts(block)[..pos].contains(&def)
                } else {
                    self.dom.dominates(def_block, block)
                }
            }
        };
        if dominated {
            Ok(())
        } else {
            Err(VerifyError::NonDominatingOperand {
                func: self.name(),
                inst,
                value,
            })
        }
    }

    /// Number of values each successor edge passes implicitly.
    fn implicit_args(&self, kind: &InstKind) -> SmallVec<[Option<usize>; 4]> {
        let ossa_default = usize::from(self.func.has_ownership);
        match kind {
            InstKind::CheckedCastBr { .. } => smallvec::smallvec![Some(1), Some(ossa_default)],
            InstKind::CheckedCastAddrBr { .. } => smallvec::smallvec![Some(0), Some(0)],
            InstKind::TryApply { .. } => smallvec::smallvec![Some(1), Some(1)],
            InstKind::SwitchEnum { cases, default, .. } => {
                // Case blocks may or may not bind the payload.
                let mut counts: SmallVec<[Option<usize>; 4]> =
                    cases.iter().map(|_| None).collect();
                if default.is_some() {
                    counts.push(Some(ossa_default));
                }
                counts
            }
            _ => SmallVec::new(),
        }
    }

    fn check_edges(&self, term: InstId) -> Result<(), VerifyError> {
        let kind = self.func.kind(term);
        let succs = kind.successors();
        for &dest in &succs {
            if !self.in_layout.get(dest.index()).copied().unwrap_or(false) {
                return Err(VerifyError::UnknownSuccessor {
                    func: self.name(),
                    inst: term,
                    dest,
                });
            }
        }

        if matches!(kind, InstKind::Br { .. } | InstKind::CondBr { .. }) {
            for (&dest, args) in succs.iter().zip(kind.branch_args()) {
                self.check_explicit_edge(term, dest, args)?;
            }
            return Ok(());
        }

        for (&dest, expected) in succs.iter().zip(self.implicit_args(kind)) {
            let found = self.func.block_params(dest).len();
            match expected {
                Some(expected) if expected != found => {
                    return Err(VerifyError::BranchArityMismatch {
                        func: self.name(),
                        inst: term,
                        dest,
                        expected,
                        found,
                    });
                }
                None if found > 1 => {
                    return Err(VerifyError::BranchArityMismatch {
                        func: self.name(),
                        inst: term,
                        dest,
                        expected: 1,
                        found,
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn check_explicit_edge(
        &self,
        term: InstId,
        dest: BlockId,
        args: &[ValueId],
    ) -> Result<(), VerifyError> {
        let params = self.func.block_params(dest);
        if params.len() != args.len() {
            return Err(VerifyError::BranchArityMismatch {
                func: self.name(),
                inst: term,
                dest,
                expected: params.len(),
                found: args.len(),
            });
        }
        if !self.func.has_ownership {
            return Ok(());
        }
        for (&param, &arg) in params.iter().zip(args) {
            let expected = self.func.value_ownership(param);
            let incoming = self.func.value_ownership(arg);
            if expected.merge(incoming).is_none() {
                return Err(VerifyError::OwnershipConflict {
                    func: self.name(),
                    inst: term,
                    dest,
                    expected,
                    incoming,
                });
            }
        }
        Ok(())
    }
}
