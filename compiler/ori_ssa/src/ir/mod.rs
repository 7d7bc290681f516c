//! SSA instruction model.
//!
//! A function body is a set of basic blocks. Each block owns its parameters
//! (phi values) and an ordered list of instructions ending in exactly one
//! terminator. Instructions are stored in the function's arena and
//! referenced by [`InstId`]; their payload is the closed [`InstKind`] enum.
//!
//! - **[`InstKind`]**: what an instruction does, with its operands inline
//! - **[`InstData`]**: kind plus results, location, scope, owning block
//! - **[`BlockData`]**: parameters and instruction order
//! - **[`ValueData`]**: type, ownership and definition site of a value

use std::fmt;

use ori_types::{Conformance, Idx, SubstitutionMap};
use smallvec::{smallvec, SmallVec};

use crate::ids::{BlockId, FuncId, InstId, ScopeId, ValueId};
use crate::ownership::OwnershipKind;

// ── Locations ───────────────────────────────────────────────────────

/// Source position carried by every instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct SourceLoc {
    pub line: u32,
    pub column: u32,
}

impl SourceLoc {
    pub const UNKNOWN: Self = Self { line: 0, column: 0 };

    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// ── Payload enums ───────────────────────────────────────────────────

/// Ownership qualifier of a `load`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadQualifier {
    /// Non-ownership code.
    Unqualified,
    /// Move the value out of memory.
    Take,
    /// Copy the value, leaving memory initialized.
    Copy,
    /// Bitwise load of a trivial value.
    Trivial,
}

/// Ownership qualifier of a `store`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreQualifier {
    Unqualified,
    /// Destination is uninitialized.
    Init,
    /// Destination holds a value that is destroyed first.
    Assign,
    Trivial,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinOp {
    Add,
    Sub,
    Mul,
    CmpEq,
    CmpLt,
    /// Abort execution. Always followed by `unreachable`.
    Trap,
}

impl BuiltinOp {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::CmpEq => "cmp_eq",
            Self::CmpLt => "cmp_lt",
            Self::Trap => "trap",
        }
    }
}

/// Profile counts for the two edges of a conditional branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct BranchWeights {
    pub success: Option<u64>,
    pub failure: Option<u64>,
}

impl BranchWeights {
    pub const fn new(success: u64, failure: u64) -> Self {
        Self {
            success: Some(success),
            failure: Some(failure),
        }
    }
}

/// Rough execution cost, used by inlining and specialization heuristics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstCost {
    Free,
    Expensive,
}

// ── Instructions ────────────────────────────────────────────────────

/// The closed set of instruction kinds.
///
/// Result types are not part of the kind; they live on the result values.
/// Kinds that name a type (`AllocStack`, `Upcast`, ...) carry it explicitly
/// so substitution can rewrite it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum InstKind {
    // ── Literals and references ─────────────────────────────────
    IntegerLiteral { value: i64 },
    FloatLiteral { bits: u64 },
    FunctionRef { func: FuncId },
    Builtin { op: BuiltinOp, args: Vec<ValueId> },

    // ── Calls ───────────────────────────────────────────────────
    /// Call `callee` with `args` (indirect results first, then params).
    Apply {
        callee: ValueId,
        subs: SubstitutionMap,
        args: Vec<ValueId>,
    },
    /// Bind trailing arguments, producing a closure.
    PartialApply {
        callee: ValueId,
        subs: SubstitutionMap,
        args: Vec<ValueId>,
    },
    /// Look up a protocol requirement implementation.
    WitnessMethod {
        lookup_ty: Idx,
        conformance: Conformance,
        member: u32,
    },

    // ── Memory ──────────────────────────────────────────────────
    AllocStack { ty: Idx },
    DeallocStack { addr: ValueId },
    Load { addr: ValueId, qualifier: LoadQualifier },
    Store {
        src: ValueId,
        dest: ValueId,
        qualifier: StoreQualifier,
    },
    CopyAddr {
        src: ValueId,
        dest: ValueId,
        take: bool,
        init: bool,
    },
    DestroyAddr { addr: ValueId },

    // ── Ownership ───────────────────────────────────────────────
    CopyValue { operand: ValueId },
    DestroyValue { operand: ValueId },
    BeginBorrow { operand: ValueId },
    EndBorrow { operand: ValueId },

    // ── Casts ───────────────────────────────────────────────────
    Upcast { operand: ValueId, ty: Idx },
    UnconditionalCheckedCast { operand: ValueId, ty: Idx },
    UnconditionalCheckedCastAddr {
        src: ValueId,
        src_ty: Idx,
        dest: ValueId,
        target_ty: Idx,
    },

    // ── Aggregates ──────────────────────────────────────────────
    Struct { fields: Vec<ValueId> },
    StructExtract { operand: ValueId, field: u32 },
    StructElementAddr { addr: ValueId, field: u32 },
    Tuple { elems: Vec<ValueId> },
    TupleExtract { operand: ValueId, index: u32 },
    Enum {
        case: u32,
        payload: Option<ValueId>,
    },
    InitExistentialAddr {
        addr: ValueId,
        concrete_ty: Idx,
        conformances: Vec<Conformance>,
    },
    Metatype { ty: Idx },

    // ── Debug and checks ────────────────────────────────────────
    DebugValue { operand: ValueId, name: String },
    CondFail { cond: ValueId },

    // ── Terminators ─────────────────────────────────────────────
    Br { dest: BlockId, args: Vec<ValueId> },
    CondBr {
        cond: ValueId,
        then_dest: BlockId,
        then_args: Vec<ValueId>,
        else_dest: BlockId,
        else_args: Vec<ValueId>,
    },
    /// `default` receives the operand as a block argument in ownership SSA.
    SwitchEnum {
        operand: ValueId,
        cases: Vec<(u32, BlockId)>,
        default: Option<BlockId>,
    },
    /// `success` receives the cast value; `failure` receives the original
    /// operand in ownership SSA and nothing otherwise.
    CheckedCastBr {
        operand: ValueId,
        target_ty: Idx,
        exact: bool,
        success: BlockId,
        failure: BlockId,
        weights: BranchWeights,
    },
    CheckedCastAddrBr {
        src: ValueId,
        src_ty: Idx,
        dest: ValueId,
        target_ty: Idx,
        success: BlockId,
        failure: BlockId,
        weights: BranchWeights,
    },
    /// `normal` receives the direct result, `error` the thrown error.
    TryApply {
        callee: ValueId,
        subs: SubstitutionMap,
        args: Vec<ValueId>,
        normal: BlockId,
        error: BlockId,
    },
    Return { value: ValueId },
    Throw { value: ValueId },
    Unreachable,
}

impl InstKind {
    /// Short mnemonic, used in logs and diagnostics.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::IntegerLiteral { .. } => "integer_literal",
            Self::FloatLiteral { .. } => "float_literal",
            Self::FunctionRef { .. } => "function_ref",
            Self::Builtin { .. } => "builtin",
            Self::Apply { .. } => "apply",
            Self::PartialApply { .. } => "partial_apply",
            Self::WitnessMethod { .. } => "witness_method",
            Self::AllocStack { .. } => "alloc_stack",
            Self::DeallocStack { .. } => "dealloc_stack",
            Self::Load { .. } => "load",
            Self::Store { .. } => "store",
            Self::CopyAddr { .. } => "copy_addr",
            Self::DestroyAddr { .. } => "destroy_addr",
            Self::CopyValue { .. } => "copy_value",
            Self::DestroyValue { .. } => "destroy_value",
            Self::BeginBorrow { .. } => "begin_borrow",
            Self::EndBorrow { .. } => "end_borrow",
            Self::Upcast { .. } => "upcast",
            Self::UnconditionalCheckedCast { .. } => "unconditional_checked_cast",
            Self::UnconditionalCheckedCastAddr { .. } => "unconditional_checked_cast_addr",
            Self::Struct { .. } => "struct",
            Self::StructExtract { .. } => "struct_extract",
            Self::StructElementAddr { .. } => "struct_element_addr",
            Self::Tuple { .. } => "tuple",
            Self::TupleExtract { .. } => "tuple_extract",
            Self::Enum { .. } => "enum",
            Self::InitExistentialAddr { .. } => "init_existential_addr",
            Self::Metatype { .. } => "metatype",
            Self::DebugValue { .. } => "debug_value",
            Self::CondFail { .. } => "cond_fail",
            Self::Br { .. } => "br",
            Self::CondBr { .. } => "cond_br",
            Self::SwitchEnum { .. } => "switch_enum",
            Self::CheckedCastBr { .. } => "checked_cast_br",
            Self::CheckedCastAddrBr { .. } => "checked_cast_addr_br",
            Self::TryApply { .. } => "try_apply",
            Self::Return { .. } => "return",
            Self::Throw { .. } => "throw",
            Self::Unreachable => "unreachable",
        }
    }

    #[inline]
    pub const fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Br { .. }
                | Self::CondBr { .. }
                | Self::SwitchEnum { .. }
                | Self::CheckedCastBr { .. }
                | Self::CheckedCastAddrBr { .. }
                | Self::TryApply { .. }
                | Self::Return { .. }
                | Self::Throw { .. }
                | Self::Unreachable
        )
    }

    /// Full and partial applications, including `try_apply`.
    #[inline]
    pub const fn is_apply_site(&self) -> bool {
        matches!(
            self,
            Self::Apply { .. } | Self::PartialApply { .. } | Self::TryApply { .. }
        )
    }

    /// Callee, substitutions and arguments of an apply site.
    pub fn apply_parts(&self) -> Option<(ValueId, &SubstitutionMap, &[ValueId])> {
        match self {
            Self::Apply { callee, subs, args }
            | Self::PartialApply { callee, subs, args }
            | Self::TryApply {
                callee, subs, args, ..
            } => Some((*callee, subs, args)),
            _ => None,
        }
    }

    pub fn cost(&self) -> InstCost {
        match self {
            Self::IntegerLiteral { .. }
            | Self::FloatLiteral { .. }
            | Self::FunctionRef { .. }
            | Self::Metatype { .. }
            | Self::Struct { .. }
            | Self::StructExtract { .. }
            | Self::StructElementAddr { .. }
            | Self::Tuple { .. }
            | Self::TupleExtract { .. }
            | Self::Enum { .. }
            | Self::Upcast { .. }
            | Self::BeginBorrow { .. }
            | Self::EndBorrow { .. }
            | Self::DebugValue { .. }
            | Self::Br { .. }
            | Self::Return { .. }
            | Self::Unreachable => InstCost::Free,

            Self::Builtin { .. }
            | Self::Apply { .. }
            | Self::PartialApply { .. }
            | Self::WitnessMethod { .. }
            | Self::AllocStack { .. }
            | Self::DeallocStack { .. }
            | Self::Load { .. }
            | Self::Store { .. }
            | Self::CopyAddr { .. }
            | Self::DestroyAddr { .. }
            | Self::CopyValue { .. }
            | Self::DestroyValue { .. }
            | Self::UnconditionalCheckedCast { .. }
            | Self::UnconditionalCheckedCastAddr { .. }
            | Self::InitExistentialAddr { .. }
            | Self::CondFail { .. }
            | Self::CondBr { .. }
            | Self::SwitchEnum { .. }
            | Self::CheckedCastBr { .. }
            | Self::CheckedCastAddrBr { .. }
            | Self::TryApply { .. }
            | Self::Throw { .. } => InstCost::Expensive,
        }
    }

    /// Instructions that become no-ops when their operand type is trivial.
    pub const fn is_foldable_when_trivial(&self) -> bool {
        matches!(
            self,
            Self::CopyValue { .. } | Self::DestroyValue { .. } | Self::DestroyAddr { .. }
        )
    }

    /// All value operands, in a fixed order.
    pub fn operands(&self) -> SmallVec<[ValueId; 4]> {
        match self {
            Self::IntegerLiteral { .. }
            | Self::FloatLiteral { .. }
            | Self::FunctionRef { .. }
            | Self::WitnessMethod { .. }
            | Self::AllocStack { .. }
            | Self::Metatype { .. }
            | Self::Unreachable => SmallVec::new(),

            Self::Builtin { args, .. } => args.iter().copied().collect(),
            Self::Struct { fields } => fields.iter().copied().collect(),
            Self::Tuple { elems } => elems.iter().copied().collect(),
            Self::Br { args, .. } => args.iter().copied().collect(),

            Self::Apply { callee, args, .. }
            | Self::PartialApply { callee, args, .. }
            | Self::TryApply { callee, args, .. } => {
                let mut ops = SmallVec::with_capacity(args.len() + 1);
                ops.push(*callee);
                ops.extend(args.iter().copied());
                ops
            }

            Self::DeallocStack { addr }
            | Self::Load { addr, .. }
            | Self::DestroyAddr { addr }
            | Self::StructElementAddr { addr, .. }
            | Self::InitExistentialAddr { addr, .. } => smallvec![*addr],

            Self::CopyValue { operand }
            | Self::DestroyValue { operand }
            | Self::BeginBorrow { operand }
            | Self::EndBorrow { operand }
            | Self::Upcast { operand, .. }
            | Self::UnconditionalCheckedCast { operand, .. }
            | Self::StructExtract { operand, .. }
            | Self::TupleExtract { operand, .. }
            | Self::DebugValue { operand, .. }
            | Self::SwitchEnum { operand, .. }
            | Self::CheckedCastBr { operand, .. } => smallvec![*operand],

            Self::CondFail { cond } => smallvec![*cond],
            Self::Return { value } | Self::Throw { value } => smallvec![*value],

            Self::Store { src, dest, .. }
            | Self::CopyAddr { src, dest, .. }
            | Self::UnconditionalCheckedCastAddr { src, dest, .. }
            | Self::CheckedCastAddrBr { src, dest, .. } => smallvec![*src, *dest],

            Self::Enum { payload, .. } => payload.iter().copied().collect(),

            Self::CondBr {
                cond,
                then_args,
                else_args,
                ..
            } => {
                let mut ops = SmallVec::with_capacity(1 + then_args.len() + else_args.len());
                ops.push(*cond);
                ops.extend(then_args.iter().copied());
                ops.extend(else_args.iter().copied());
                ops
            }
        }
    }

    /// Rewrite every value operand through `f`, in [`operands`](Self::operands) order.
    pub fn map_operands(&mut self, mut f: impl FnMut(ValueId) -> ValueId) {
        fn each(vals: &mut [ValueId], f: &mut impl FnMut(ValueId) -> ValueId) {
            for v in vals {
                *v = f(*v);
            }
        }
        match self {
            Self::IntegerLiteral { .. }
            | Self::FloatLiteral { .. }
            | Self::FunctionRef { .. }
            | Self::WitnessMethod { .. }
            | Self::AllocStack { .. }
            | Self::Metatype { .. }
            | Self::Unreachable => {}

            Self::Builtin { args, .. } | Self::Br { args, .. } => each(args, &mut f),
            Self::Struct { fields } => each(fields, &mut f),
            Self::Tuple { elems } => each(elems, &mut f),

            Self::Apply { callee, args, .. }
            | Self::PartialApply { callee, args, .. }
            | Self::TryApply { callee, args, .. } => {
                *callee = f(*callee);
                each(args, &mut f);
            }

            Self::DeallocStack { addr }
            | Self::Load { addr, .. }
            | Self::DestroyAddr { addr }
            | Self::StructElementAddr { addr, .. }
            | Self::InitExistentialAddr { addr, .. } => *addr = f(*addr),

            Self::CopyValue { operand }
            | Self::DestroyValue { operand }
            | Self::BeginBorrow { operand }
            | Self::EndBorrow { operand }
            | Self::Upcast { operand, .. }
            | Self::UnconditionalCheckedCast { operand, .. }
            | Self::StructExtract { operand, .. }
            | Self::TupleExtract { operand, .. }
            | Self::DebugValue { operand, .. }
            | Self::SwitchEnum { operand, .. }
            | Self::CheckedCastBr { operand, .. } => *operand = f(*operand),

            Self::CondFail { cond } => *cond = f(*cond),
            Self::Return { value } | Self::Throw { value } => *value = f(*value),

            Self::Store { src, dest, .. }
            | Self::CopyAddr { src, dest, .. }
            | Self::UnconditionalCheckedCastAddr { src, dest, .. }
            | Self::CheckedCastAddrBr { src, dest, .. } => {
                *src = f(*src);
                *dest = f(*dest);
            }

            Self::Enum { payload, .. } => {
                if let Some(p) = payload {
                    *p = f(*p);
                }
            }

            Self::CondBr {
                cond,
                then_args,
                else_args,
                ..
            } => {
                *cond = f(*cond);
                each(then_args, &mut f);
                each(else_args, &mut f);
            }
        }
    }

    /// Successor blocks of a terminator; empty for everything else.
    ///
    /// Returns `SmallVec<[BlockId; 4]>` to avoid heap allocation for the
    /// common case (max 2 successors except `switch_enum` with many cases).
    pub fn successors(&self) -> SmallVec<[BlockId; 4]> {
        match self {
            Self::Br { dest, .. } => smallvec![*dest],
            Self::CondBr {
                then_dest,
                else_dest,
                ..
            } => smallvec![*then_dest, *else_dest],
            Self::SwitchEnum { cases, default, .. } => {
                let mut targets = SmallVec::with_capacity(cases.len() + 1);
                targets.extend(cases.iter().map(|&(_, b)| b));
                targets.extend(*default);
                targets
            }
            Self::CheckedCastBr {
                success, failure, ..
            }
            | Self::CheckedCastAddrBr {
                success, failure, ..
            } => smallvec![*success, *failure],
            Self::TryApply { normal, error, .. } => smallvec![*normal, *error],
            _ => SmallVec::new(),
        }
    }

    /// Rewrite every successor block through `f`, in
    /// [`successors`](Self::successors) order.
    pub fn map_blocks(&mut self, mut f: impl FnMut(BlockId) -> BlockId) {
        match self {
            Self::Br { dest, .. } => *dest = f(*dest),
            Self::CondBr {
                then_dest,
                else_dest,
                ..
            } => {
                *then_dest = f(*then_dest);
                *else_dest = f(*else_dest);
            }
            Self::SwitchEnum { cases, default, .. } => {
                for (_, b) in cases.iter_mut() {
                    *b = f(*b);
                }
                if let Some(d) = default {
                    *d = f(*d);
                }
            }
            Self::CheckedCastBr {
                success, failure, ..
            }
            | Self::CheckedCastAddrBr {
                success, failure, ..
            } => {
                *success = f(*success);
                *failure = f(*failure);
            }
            Self::TryApply { normal, error, .. } => {
                *normal = f(*normal);
                *error = f(*error);
            }
            _ => {}
        }
    }

    /// Arguments passed along each successor edge, parallel to
    /// [`successors`](Self::successors). Edges that pass implicit
    /// arguments (cast results, call results) report an empty slice.
    pub fn branch_args(&self) -> SmallVec<[&[ValueId]; 4]> {
        match self {
            Self::Br { args, .. } => smallvec![args.as_slice()],
            Self::CondBr {
                then_args,
                else_args,
                ..
            } => smallvec![then_args.as_slice(), else_args.as_slice()],
            other => other
                .successors()
                .iter()
                .map(|_| -> &[ValueId] { &[] })
                .collect(),
        }
    }
}

// ── Arena records ───────────────────────────────────────────────────

/// An instruction in a function's arena.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstData {
    pub kind: InstKind,
    pub results: SmallVec<[ValueId; 1]>,
    pub loc: SourceLoc,
    pub scope: Option<ScopeId>,
    /// `None` once erased.
    pub block: Option<BlockId>,
}

/// A basic block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockData {
    pub params: Vec<ValueId>,
    pub insts: Vec<InstId>,
}

/// Where a value comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueDef {
    Result { inst: InstId, index: u32 },
    Param { block: BlockId, index: u32 },
    /// The per-type undefined sentinel of a function.
    Undef,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ValueData {
    pub ty: Idx,
    pub ownership: OwnershipKind,
    pub def: ValueDef,
}

#[cfg(test)]
mod tests;
