//! Instruction builder.
//!
//! [`FunctionBuilder`] follows the "position, emit, terminate" pattern:
//! pick an insertion point (end of a block or before an instruction), then
//! call one helper per instruction kind. Each helper derives the result
//! type from its operands and the result ownership from the function's
//! mode and the result type's lowering.

use ori_types::{Idx, LoweringContext, Pool, SubstitutionMap, Tag, TypeLowering};

use crate::function::Function;
use crate::ids::{BlockId, FuncId, InstId, ScopeId, ValueId};
use crate::ir::{
    BranchWeights, BuiltinOp, InstKind, LoadQualifier, SourceLoc, StoreQualifier,
};
use crate::ownership::OwnershipKind;

/// Where the next instruction goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertPoint {
    End(BlockId),
    Before(InstId),
}

pub struct FunctionBuilder<'a> {
    pool: &'a mut Pool,
    func: &'a mut Function,
    lowering: TypeLowering,
    point: Option<InsertPoint>,
    loc: SourceLoc,
    scope: Option<ScopeId>,
}

impl<'a> FunctionBuilder<'a> {
    /// Build into `func`, lowering types as seen from its own module.
    pub fn new(pool: &'a mut Pool, func: &'a mut Function) -> Self {
        let ctx = LoweringContext::new(func.module);
        Self::with_context(pool, func, ctx)
    }

    pub fn with_context(pool: &'a mut Pool, func: &'a mut Function, ctx: LoweringContext) -> Self {
        let scope = func.scope;
        Self {
            pool,
            func,
            lowering: TypeLowering::new(ctx),
            point: None,
            loc: SourceLoc::UNKNOWN,
            scope,
        }
    }

    // ── Positioning ─────────────────────────────────────────────

    pub fn position_at_end(&mut self, block: BlockId) {
        debug_assert!(
            block.index() < self.func.block_count(),
            "{block} out of bounds (have {} blocks)",
            self.func.block_count()
        );
        self.point = Some(InsertPoint::End(block));
    }

    pub fn position_before(&mut self, inst: InstId) {
        self.point = Some(InsertPoint::Before(inst));
    }

    pub fn set_loc(&mut self, loc: SourceLoc) {
        self.loc = loc;
    }

    pub fn set_scope(&mut self, scope: Option<ScopeId>) {
        self.scope = scope;
    }

    pub fn insert_point(&self) -> Option<InsertPoint> {
        self.point
    }

    /// Block the next instruction will land in.
    pub fn current_block(&self) -> Option<BlockId> {
        match self.point? {
            InsertPoint::End(b) => Some(b),
            InsertPoint::Before(i) => self.func.inst(i).block,
        }
    }

    pub fn pool(&mut self) -> &mut Pool {
        &mut *self.pool
    }

    pub fn func(&self) -> &Function {
        &*self.func
    }

    pub fn func_mut(&mut self) -> &mut Function {
        &mut *self.func
    }

    // ── Blocks ──────────────────────────────────────────────────

    pub fn create_block(&mut self) -> BlockId {
        self.func.create_block()
    }

    pub fn create_block_after(&mut self, after: BlockId) -> BlockId {
        self.func.create_block_after(after)
    }

    /// Add a block parameter whose ownership follows its type.
    pub fn add_block_param(&mut self, block: BlockId, ty: Idx) -> ValueId {
        let own = self.ownership_for(ty);
        self.func.add_block_param(block, ty, own)
    }

    // ── Ownership ───────────────────────────────────────────────

    /// Ownership of a freshly produced value of type `ty`.
    pub fn ownership_for(&mut self, ty: Idx) -> OwnershipKind {
        if !self.func.has_ownership || self.pool.tag(ty) == Tag::Address {
            return OwnershipKind::None;
        }
        if self.lowering.is_trivial(self.pool, ty) {
            OwnershipKind::None
        } else {
            OwnershipKind::Owned
        }
    }

    pub fn is_trivial(&mut self, ty: Idx) -> bool {
        self.lowering.is_trivial(self.pool, ty)
    }

    // ── Raw emission ────────────────────────────────────────────

    /// Emit `kind` at the insertion point with explicit result types.
    ///
    /// # Panics
    /// Panics if no insertion point is set.
    pub fn emit(&mut self, kind: InstKind, results: &[(Idx, OwnershipKind)]) -> InstId {
        let point = self
            .point
            .unwrap_or_else(|| panic!("builder for `{}` has no insertion point", self.func.name));
        match point {
            InsertPoint::End(block) => {
                self.func
                    .append_inst(block, kind, results, self.loc, self.scope)
            }
            InsertPoint::Before(before) => {
                self.func
                    .insert_inst_before(before, kind, results, self.loc, self.scope)
            }
        }
    }

    fn emit_value(&mut self, kind: InstKind, ty: Idx, own: OwnershipKind) -> ValueId {
        let inst = self.emit(kind, &[(ty, own)]);
        self.func.result(inst)
    }

    fn emit_owned(&mut self, kind: InstKind, ty: Idx) -> ValueId {
        let own = self.ownership_for(ty);
        self.emit_value(kind, ty, own)
    }

    fn emit_void(&mut self, kind: InstKind) -> InstId {
        self.emit(kind, &[])
    }

    fn ty(&self, v: ValueId) -> Idx {
        self.func.value_type(v)
    }

    // ── Literals and references ─────────────────────────────────

    pub fn integer_literal(&mut self, ty: Idx, value: i64) -> ValueId {
        self.emit_value(InstKind::IntegerLiteral { value }, ty, OwnershipKind::None)
    }

    pub fn float_literal(&mut self, value: f64) -> ValueId {
        self.emit_value(
            InstKind::FloatLiteral {
                bits: value.to_bits(),
            },
            Idx::FLOAT64,
            OwnershipKind::None,
        )
    }

    /// Reference a function; `fn_ty` is its lowered function type.
    pub fn function_ref(&mut self, func: FuncId, fn_ty: Idx) -> ValueId {
        self.emit_value(InstKind::FunctionRef { func }, fn_ty, OwnershipKind::None)
    }

    pub fn builtin(&mut self, op: BuiltinOp, args: Vec<ValueId>, ty: Idx) -> ValueId {
        self.emit_value(InstKind::Builtin { op, args }, ty, OwnershipKind::None)
    }

    /// `builtin trap` followed by `unreachable`.
    pub fn trap(&mut self) -> InstId {
        self.emit(
            InstKind::Builtin {
                op: BuiltinOp::Trap,
                args: Vec::new(),
            },
            &[(Idx::UNIT, OwnershipKind::None)],
        );
        self.unreachable()
    }

    // ── Calls ───────────────────────────────────────────────────

    pub fn apply(
        &mut self,
        callee: ValueId,
        subs: SubstitutionMap,
        args: Vec<ValueId>,
        result_ty: Idx,
    ) -> ValueId {
        self.emit_owned(InstKind::Apply { callee, subs, args }, result_ty)
    }

    pub fn partial_apply(
        &mut self,
        callee: ValueId,
        subs: SubstitutionMap,
        args: Vec<ValueId>,
        closure_ty: Idx,
    ) -> ValueId {
        self.emit_owned(InstKind::PartialApply { callee, subs, args }, closure_ty)
    }

    pub fn witness_method(
        &mut self,
        lookup_ty: Idx,
        conformance: ori_types::Conformance,
        member: u32,
        fn_ty: Idx,
    ) -> ValueId {
        self.emit_value(
            InstKind::WitnessMethod {
                lookup_ty,
                conformance,
                member,
            },
            fn_ty,
            OwnershipKind::None,
        )
    }

    // ── Memory ──────────────────────────────────────────────────

    pub fn alloc_stack(&mut self, ty: Idx) -> ValueId {
        let addr_ty = self.pool.address(ty);
        self.emit_value(InstKind::AllocStack { ty }, addr_ty, OwnershipKind::None)
    }

    pub fn dealloc_stack(&mut self, addr: ValueId) -> InstId {
        self.emit_void(InstKind::DeallocStack { addr })
    }

    /// Load from `addr`. The qualifier is chosen from the mode and the
    /// loaded type unless `take` forces a move.
    pub fn load(&mut self, addr: ValueId, take: bool) -> ValueId {
        let ty = self.pool.child(self.ty(addr));
        let qualifier = if !self.func.has_ownership {
            LoadQualifier::Unqualified
        } else if self.is_trivial(ty) {
            LoadQualifier::Trivial
        } else if take {
            LoadQualifier::Take
        } else {
            LoadQualifier::Copy
        };
        self.emit_owned(InstKind::Load { addr, qualifier }, ty)
    }

    /// Store `src` into `dest`, initializing it when `init` is set.
    pub fn store(&mut self, src: ValueId, dest: ValueId, init: bool) -> InstId {
        let ty = self.ty(src);
        let qualifier = if !self.func.has_ownership {
            StoreQualifier::Unqualified
        } else if self.is_trivial(ty) {
            StoreQualifier::Trivial
        } else if init {
            StoreQualifier::Init
        } else {
            StoreQualifier::Assign
        };
        self.emit_void(InstKind::Store {
            src,
            dest,
            qualifier,
        })
    }

    pub fn copy_addr(&mut self, src: ValueId, dest: ValueId, take: bool, init: bool) -> InstId {
        self.emit_void(InstKind::CopyAddr {
            src,
            dest,
            take,
            init,
        })
    }

    pub fn destroy_addr(&mut self, addr: ValueId) -> InstId {
        self.emit_void(InstKind::DestroyAddr { addr })
    }

    // ── Ownership ───────────────────────────────────────────────

    pub fn copy_value(&mut self, operand: ValueId) -> ValueId {
        let ty = self.ty(operand);
        self.emit_owned(InstKind::CopyValue { operand }, ty)
    }

    pub fn destroy_value(&mut self, operand: ValueId) -> InstId {
        self.emit_void(InstKind::DestroyValue { operand })
    }

    pub fn begin_borrow(&mut self, operand: ValueId) -> ValueId {
        let ty = self.ty(operand);
        let own = if self.ownership_for(ty).is_none() {
            OwnershipKind::None
        } else {
            OwnershipKind::Guaranteed
        };
        self.emit_value(InstKind::BeginBorrow { operand }, ty, own)
    }

    pub fn end_borrow(&mut self, operand: ValueId) -> InstId {
        self.emit_void(InstKind::EndBorrow { operand })
    }

    // ── Casts ───────────────────────────────────────────────────

    pub fn upcast(&mut self, operand: ValueId, ty: Idx) -> ValueId {
        let own = self.func.value_ownership(operand);
        self.emit_value(InstKind::Upcast { operand, ty }, ty, own)
    }

    pub fn unconditional_checked_cast(&mut self, operand: ValueId, ty: Idx) -> ValueId {
        let own = self.func.value_ownership(operand);
        self.emit_value(InstKind::UnconditionalCheckedCast { operand, ty }, ty, own)
    }

    pub fn unconditional_checked_cast_addr(
        &mut self,
        src: ValueId,
        src_ty: Idx,
        dest: ValueId,
        target_ty: Idx,
    ) -> InstId {
        self.emit_void(InstKind::UnconditionalCheckedCastAddr {
            src,
            src_ty,
            dest,
            target_ty,
        })
    }

    // ── Aggregates ──────────────────────────────────────────────

    pub fn struct_(&mut self, ty: Idx, fields: Vec<ValueId>) -> ValueId {
        self.emit_owned(InstKind::Struct { fields }, ty)
    }

    /// # Panics
    /// Panics if the operand has no field `field`.
    pub fn struct_extract(&mut self, operand: ValueId, field: u32) -> ValueId {
        let agg = self.ty(operand);
        let ty = self.field_type(agg, field);
        let own = if self.is_trivial(ty) {
            OwnershipKind::None
        } else {
            self.func.value_ownership(operand)
        };
        self.emit_value(InstKind::StructExtract { operand, field }, ty, own)
    }

    pub fn struct_element_addr(&mut self, addr: ValueId, field: u32) -> ValueId {
        let agg = self.pool.child(self.ty(addr));
        let field_ty = self.field_type(agg, field);
        let ty = self.pool.address(field_ty);
        self.emit_value(InstKind::StructElementAddr { addr, field }, ty, OwnershipKind::None)
    }

    fn field_type(&mut self, agg: Idx, field: u32) -> Idx {
        let fields = self.pool.field_types(agg);
        fields.get(field as usize).copied().unwrap_or_else(|| {
            panic!(
                "{} has no field {field}",
                self.pool.format_type(agg)
            )
        })
    }

    pub fn tuple(&mut self, elems: Vec<ValueId>) -> ValueId {
        let tys: Vec<Idx> = elems.iter().map(|&e| self.ty(e)).collect();
        let ty = self.pool.tuple(&tys);
        self.emit_owned(InstKind::Tuple { elems }, ty)
    }

    pub fn tuple_extract(&mut self, operand: ValueId, index: u32) -> ValueId {
        let elems = self.pool.tuple_elems(self.ty(operand));
        let ty = elems.get(index as usize).copied().unwrap_or_else(|| {
            panic!("{operand} has no tuple element {index}")
        });
        let own = if self.is_trivial(ty) {
            OwnershipKind::None
        } else {
            self.func.value_ownership(operand)
        };
        self.emit_value(InstKind::TupleExtract { operand, index }, ty, own)
    }

    pub fn enum_(&mut self, ty: Idx, case: u32, payload: Option<ValueId>) -> ValueId {
        self.emit_owned(InstKind::Enum { case, payload }, ty)
    }

    pub fn init_existential_addr(
        &mut self,
        addr: ValueId,
        concrete_ty: Idx,
        conformances: Vec<ori_types::Conformance>,
    ) -> ValueId {
        let ty = self.pool.address(concrete_ty);
        self.emit_value(
            InstKind::InitExistentialAddr {
                addr,
                concrete_ty,
                conformances,
            },
            ty,
            OwnershipKind::None,
        )
    }

    pub fn metatype(&mut self, ty: Idx) -> ValueId {
        let meta = self.pool.metatype(ty);
        self.emit_value(InstKind::Metatype { ty }, meta, OwnershipKind::None)
    }

    // ── Debug and checks ────────────────────────────────────────

    pub fn debug_value(&mut self, operand: ValueId, name: impl Into<String>) -> InstId {
        self.emit_void(InstKind::DebugValue {
            operand,
            name: name.into(),
        })
    }

    pub fn cond_fail(&mut self, cond: ValueId) -> InstId {
        self.emit_void(InstKind::CondFail { cond })
    }

    // ── Terminators ─────────────────────────────────────────────

    pub fn br(&mut self, dest: BlockId, args: Vec<ValueId>) -> InstId {
        self.emit_void(InstKind::Br { dest, args })
    }

    pub fn cond_br(
        &mut self,
        cond: ValueId,
        then_dest: BlockId,
        then_args: Vec<ValueId>,
        else_dest: BlockId,
        else_args: Vec<ValueId>,
    ) -> InstId {
        self.emit_void(InstKind::CondBr {
            cond,
            then_dest,
            then_args,
            else_dest,
            else_args,
        })
    }

    pub fn switch_enum(
        &mut self,
        operand: ValueId,
        cases: Vec<(u32, BlockId)>,
        default: Option<BlockId>,
    ) -> InstId {
        self.emit_void(InstKind::SwitchEnum {
            operand,
            cases,
            default,
        })
    }

    pub fn checked_cast_br(
        &mut self,
        operand: ValueId,
        target_ty: Idx,
        exact: bool,
        success: BlockId,
        failure: BlockId,
        weights: BranchWeights,
    ) -> InstId {
        self.emit_void(InstKind::CheckedCastBr {
            operand,
            target_ty,
            exact,
            success,
            failure,
            weights,
        })
    }

    #[expect(clippy::too_many_arguments, reason = "mirrors the instruction payload")]
    pub fn checked_cast_addr_br(
        &mut self,
        src: ValueId,
        src_ty: Idx,
        dest: ValueId,
        target_ty: Idx,
        success: BlockId,
        failure: BlockId,
        weights: BranchWeights,
    ) -> InstId {
        self.emit_void(InstKind::CheckedCastAddrBr {
            src,
            src_ty,
            dest,
            target_ty,
            success,
            failure,
            weights,
        })
    }

    pub fn try_apply(
        &mut self,
        callee: ValueId,
        subs: SubstitutionMap,
        args: Vec<ValueId>,
        normal: BlockId,
        error: BlockId,
    ) -> InstId {
        self.emit_void(InstKind::TryApply {
            callee,
            subs,
            args,
            normal,
            error,
        })
    }

    pub fn return_(&mut self, value: ValueId) -> InstId {
        self.emit_void(InstKind::Return { value })
    }

    pub fn throw(&mut self, value: ValueId) -> InstId {
        self.emit_void(InstKind::Throw { value })
    }

    pub fn unreachable(&mut self) -> InstId {
        self.emit_void(InstKind::Unreachable)
    }

    /// A unit value, for returning from functions without direct results.
    pub fn unit(&mut self) -> ValueId {
        self.tuple(Vec::new())
    }
}
