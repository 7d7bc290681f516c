//! Functions: arenas of values, instructions and blocks plus a layout.
//!
//! Ids are indices into the arenas and stay valid for the lifetime of the
//! function. Erasing an instruction unlinks it from its block; the arena
//! slot stays behind so ids held elsewhere never dangle.

use ori_types::{Idx, ModuleId, SubstitutionMap};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::func_type::SilFunctionType;
use crate::ids::{BlockId, FuncId, InstId, ScopeId, ValueId};
use crate::ir::{BlockData, InstData, InstKind, SourceLoc, ValueData, ValueDef};
use crate::ownership::OwnershipKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Linkage {
    /// Visible outside the module.
    Public,
    /// May be emitted in several modules and deduplicated by the linker.
    Shared,
    Private,
}

/// Provenance of a specialized function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecializationInfo {
    pub original: FuncId,
    pub subs: SubstitutionMap,
}

/// A function: signature, flags and body.
///
/// A function without blocks is a declaration.
#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    pub ty: SilFunctionType,
    pub linkage: Linkage,
    pub module: ModuleId,
    /// The body may be inlined into other modules.
    pub serialized: bool,
    /// The body is in ownership SSA form.
    pub has_ownership: bool,
    /// Declaration created only to root debug scopes.
    pub debug_only: bool,
    pub scope: Option<ScopeId>,
    pub specialization_of: Option<SpecializationInfo>,
    values: Vec<ValueData>,
    insts: Vec<InstData>,
    blocks: Vec<BlockData>,
    layout: Vec<BlockId>,
    undefs: FxHashMap<Idx, ValueId>,
}

impl Function {
    /// Create a declaration with no body.
    pub fn new(name: impl Into<String>, ty: SilFunctionType) -> Self {
        Self {
            name: name.into(),
            ty,
            linkage: Linkage::Public,
            module: ModuleId::MAIN,
            serialized: false,
            has_ownership: false,
            debug_only: false,
            scope: None,
            specialization_of: None,
            values: Vec::new(),
            insts: Vec::new(),
            blocks: Vec::new(),
            layout: Vec::new(),
            undefs: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn with_ownership(mut self, on: bool) -> Self {
        self.has_ownership = on;
        self
    }

    #[must_use]
    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    #[must_use]
    pub fn in_module(mut self, module: ModuleId) -> Self {
        self.module = module;
        self
    }

    #[must_use]
    pub fn serialized(mut self, on: bool) -> Self {
        self.serialized = on;
        self
    }

    // ── Queries ─────────────────────────────────────────────────

    #[inline]
    pub fn is_declaration(&self) -> bool {
        self.layout.is_empty()
    }

    /// Blocks in layout order; `layout()[0]` is the entry.
    #[inline]
    pub fn layout(&self) -> &[BlockId] {
        &self.layout
    }

    #[inline]
    pub fn entry_block(&self) -> Option<BlockId> {
        self.layout.first().copied()
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &BlockData {
        &self.blocks[id.index()]
    }

    #[inline]
    pub fn inst(&self, id: InstId) -> &InstData {
        &self.insts[id.index()]
    }

    #[inline]
    pub fn inst_mut(&mut self, id: InstId) -> &mut InstData {
        &mut self.insts[id.index()]
    }

    #[inline]
    pub fn kind(&self, id: InstId) -> &InstKind {
        &self.insts[id.index()].kind
    }

    #[inline]
    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.index()]
    }

    #[inline]
    pub fn value_type(&self, id: ValueId) -> Idx {
        self.values[id.index()].ty
    }

    #[inline]
    pub fn value_ownership(&self, id: ValueId) -> OwnershipKind {
        self.values[id.index()].ownership
    }

    /// Number of values ever created (arena size).
    #[inline]
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn inst_count(&self) -> usize {
        self.insts.len()
    }

    pub fn block_params(&self, block: BlockId) -> &[ValueId] {
        &self.blocks[block.index()].params
    }

    pub fn block_insts(&self, block: BlockId) -> &[InstId] {
        &self.blocks[block.index()].insts
    }

    /// The single result of an instruction.
    ///
    /// # Panics
    /// Panics if the instruction does not have exactly one result.
    pub fn result(&self, inst: InstId) -> ValueId {
        match self.insts[inst.index()].results.as_slice() {
            [single] => *single,
            other => panic!(
                "{} ({inst}) has {} results, expected one",
                self.kind(inst).name(),
                other.len()
            ),
        }
    }

    /// The instruction defining `value`, if it is an instruction result.
    pub fn defining_inst(&self, value: ValueId) -> Option<InstId> {
        match self.value(value).def {
            ValueDef::Result { inst, .. } => Some(inst),
            _ => None,
        }
    }

    /// Last instruction of `block` if it is a terminator.
    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        let last = *self.blocks[block.index()].insts.last()?;
        self.kind(last).is_terminator().then_some(last)
    }

    pub fn successors(&self, block: BlockId) -> SmallVec<[BlockId; 4]> {
        self.terminator(block)
            .map(|t| self.kind(t).successors())
            .unwrap_or_default()
    }

    /// Whether the instruction is still linked into a block.
    #[inline]
    pub fn is_attached(&self, inst: InstId) -> bool {
        self.insts[inst.index()].block.is_some()
    }

    /// All attached instructions in layout order.
    pub fn insts_in_layout_order(&self) -> Vec<InstId> {
        self.layout
            .iter()
            .flat_map(|&b| self.blocks[b.index()].insts.iter().copied())
            .collect()
    }

    /// Attached instructions that read `value`.
    pub fn uses(&self, value: ValueId) -> Vec<InstId> {
        self.insts_in_layout_order()
            .into_iter()
            .filter(|&i| self.kind(i).operands().contains(&value))
            .collect()
    }

    pub fn has_uses(&self, value: ValueId) -> bool {
        self.layout.iter().any(|&b| {
            self.blocks[b.index()]
                .insts
                .iter()
                .any(|&i| self.kind(i).operands().contains(&value))
        })
    }

    fn position_in_block(&self, inst: InstId) -> (BlockId, usize) {
        let block = self.insts[inst.index()]
            .block
            .unwrap_or_else(|| panic!("{inst} is not attached to a block"));
        let pos = self.blocks[block.index()]
            .insts
            .iter()
            .position(|&i| i == inst)
            .unwrap_or_else(|| panic!("{inst} missing from {block}"));
        (block, pos)
    }

    // ── Blocks ──────────────────────────────────────────────────

    fn alloc_block(&mut self) -> BlockId {
        let id = BlockId::from_index(self.blocks.len());
        self.blocks.push(BlockData::default());
        id
    }

    /// Create a block at the end of the layout.
    pub fn create_block(&mut self) -> BlockId {
        let id = self.alloc_block();
        self.layout.push(id);
        id
    }

    /// Create a block placed immediately after `after` in the layout.
    pub fn create_block_after(&mut self, after: BlockId) -> BlockId {
        let id = self.alloc_block();
        let pos = self
            .layout
            .iter()
            .position(|&b| b == after)
            .unwrap_or_else(|| panic!("{after} is not in the layout of {}", self.name));
        self.layout.insert(pos + 1, id);
        id
    }

    fn alloc_value(&mut self, ty: Idx, ownership: OwnershipKind, def: ValueDef) -> ValueId {
        let id = ValueId::from_index(self.values.len());
        self.values.push(ValueData { ty, ownership, def });
        id
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn add_block_param(&mut self, block: BlockId, ty: Idx, ownership: OwnershipKind) -> ValueId {
        let index = self.blocks[block.index()].params.len() as u32;
        let v = self.alloc_value(ty, ownership, ValueDef::Param { block, index });
        self.blocks[block.index()].params.push(v);
        v
    }

    /// Remove a block parameter. Its uses must already be replaced.
    #[allow(clippy::cast_possible_truncation)]
    pub fn erase_block_param(&mut self, block: BlockId, index: usize) {
        let removed = self.blocks[block.index()].params.remove(index);
        debug_assert!(!self.has_uses(removed), "erasing block param {removed} with uses");
        let remaining = self.blocks[block.index()].params[index..].to_vec();
        for (offset, v) in remaining.into_iter().enumerate() {
            self.values[v.index()].def = ValueDef::Param {
                block,
                index: (index + offset) as u32,
            };
        }
    }

    /// The undefined sentinel of type `ty` (one per type per function).
    pub fn undef(&mut self, ty: Idx) -> ValueId {
        if let Some(&v) = self.undefs.get(&ty) {
            return v;
        }
        let v = self.alloc_value(ty, OwnershipKind::None, ValueDef::Undef);
        self.undefs.insert(ty, v);
        v
    }

    /// Undef sentinels created so far, as `(type, value)` pairs.
    pub fn undefs(&self) -> impl Iterator<Item = (Idx, ValueId)> + '_ {
        self.undefs.iter().map(|(&ty, &v)| (ty, v))
    }

    // ── Instructions ────────────────────────────────────────────

    #[allow(clippy::cast_possible_truncation)]
    fn alloc_inst(
        &mut self,
        kind: InstKind,
        results: &[(Idx, OwnershipKind)],
        loc: SourceLoc,
        scope: Option<ScopeId>,
        block: BlockId,
    ) -> InstId {
        let id = InstId::from_index(self.insts.len());
        let results = results
            .iter()
            .enumerate()
            .map(|(index, &(ty, own))| {
                self.alloc_value(
                    ty,
                    own,
                    ValueDef::Result {
                        inst: id,
                        index: index as u32,
                    },
                )
            })
            .collect();
        self.insts.push(InstData {
            kind,
            results,
            loc,
            scope,
            block: Some(block),
        });
        id
    }

    /// Append an instruction at the end of `block`.
    pub fn append_inst(
        &mut self,
        block: BlockId,
        kind: InstKind,
        results: &[(Idx, OwnershipKind)],
        loc: SourceLoc,
        scope: Option<ScopeId>,
    ) -> InstId {
        let id = self.alloc_inst(kind, results, loc, scope, block);
        self.blocks[block.index()].insts.push(id);
        id
    }

    /// Insert an instruction immediately before `before`.
    pub fn insert_inst_before(
        &mut self,
        before: InstId,
        kind: InstKind,
        results: &[(Idx, OwnershipKind)],
        loc: SourceLoc,
        scope: Option<ScopeId>,
    ) -> InstId {
        let (block, pos) = self.position_in_block(before);
        let id = self.alloc_inst(kind, results, loc, scope, block);
        self.blocks[block.index()].insts.insert(pos, id);
        id
    }

    /// Insert an instruction immediately after `after`.
    pub fn insert_inst_after(
        &mut self,
        after: InstId,
        kind: InstKind,
        results: &[(Idx, OwnershipKind)],
        loc: SourceLoc,
        scope: Option<ScopeId>,
    ) -> InstId {
        let (block, pos) = self.position_in_block(after);
        let id = self.alloc_inst(kind, results, loc, scope, block);
        self.blocks[block.index()].insts.insert(pos + 1, id);
        id
    }

    /// Instructions of the same block that follow `inst`.
    pub fn insts_after(&self, inst: InstId) -> Vec<InstId> {
        let (block, pos) = self.position_in_block(inst);
        self.blocks[block.index()].insts[pos + 1..].to_vec()
    }

    /// Unlink an instruction from its block.
    pub fn erase_inst(&mut self, inst: InstId) {
        let (block, pos) = self.position_in_block(inst);
        self.blocks[block.index()].insts.remove(pos);
        self.insts[inst.index()].block = None;
    }

    /// Detach `block` and its instructions from the layout. Values it
    /// defines must have no remaining uses outside it.
    pub fn remove_block(&mut self, block: BlockId) {
        let pos = self
            .layout
            .iter()
            .position(|&b| b == block)
            .unwrap_or_else(|| panic!("{block} is not in the layout of {}", self.name));
        self.layout.remove(pos);
        for inst in std::mem::take(&mut self.blocks[block.index()].insts) {
            self.insts[inst.index()].block = None;
        }
    }

    /// Rewrite every use of `old` in attached instructions to `new`.
    pub fn replace_all_uses(&mut self, old: ValueId, new: ValueId) {
        if old == new {
            return;
        }
        for b in self.layout.clone() {
            for i in self.blocks[b.index()].insts.clone() {
                self.insts[i.index()]
                    .kind
                    .map_operands(|v| if v == old { new } else { v });
            }
        }
    }
}
