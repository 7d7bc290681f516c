//! SSA value/instruction model for the Ori mid-level IR.
//!
//! This crate provides:
//!
//! - **Ownership kinds** ([`OwnershipKind`]) and their merge lattice.
//! - **Instructions** ([`InstKind`], [`InstData`]): a closed enum with
//!   operand, successor, cost and foldability queries.
//! - **Functions** ([`Function`]): arenas of values, instructions and blocks
//!   plus a block layout, typed by a lowered [`SilFunctionType`].
//! - **Modules** ([`Module`]): the type pool, the function table and the
//!   debug-scope table, with [`FunctionNotifier`] hooks for the pass manager.
//! - **Builder** ([`FunctionBuilder`]), **CFG utilities** ([`graph`]) and a
//!   **verifier** ([`verify_function`]).
//!
//! # Crate Dependencies
//!
//! `ori_ssa` depends on `ori_types` for `Pool`/`Idx`, substitution maps and
//! type lowering. It knows nothing about specialization.

pub mod builder;
pub mod func_type;
pub mod function;
pub mod graph;
mod ids;
pub mod ir;
pub mod module;
pub mod ownership;
pub mod verify;

#[cfg(test)]
mod test_helpers;

pub use builder::{FunctionBuilder, InsertPoint};
pub use func_type::{ParamConvention, ResultConvention, SilFunctionType, SilParam, SilResult};
pub use function::{Function, Linkage, SpecializationInfo};
pub use graph::DominatorTree;
pub use ids::{BlockId, FuncId, InstId, ScopeId, ValueId};
pub use ir::{
    BlockData, BranchWeights, BuiltinOp, InstCost, InstData, InstKind, LoadQualifier, SourceLoc,
    StoreQualifier, ValueData, ValueDef,
};
pub use module::{
    DebugScope, FunctionNotifier, FunctionTable, Module, ModuleConfig, NoopNotifier, ScopeParent,
    ScopeTable,
};
pub use ownership::OwnershipKind;
pub use verify::{verify_function, VerifyError};

#[cfg(target_pointer_width = "64")]
mod size_asserts {
    use super::{BlockId, ValueId};
    const _: () = assert!(std::mem::size_of::<ValueId>() == 4);
    const _: () = assert!(std::mem::size_of::<BlockId>() == 4);
}
