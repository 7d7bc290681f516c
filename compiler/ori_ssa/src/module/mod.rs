//! Modules: the type pool, the function table and the debug-scope table.

use ori_types::{ModuleId, Pool};
use rustc_hash::FxHashMap;

use crate::function::Function;
use crate::ids::{FuncId, ScopeId};
use crate::ir::SourceLoc;

// ── Pass-manager notifications ──────────────────────────────────────

/// Observer of function creation and deletion.
pub trait FunctionNotifier {
    fn notify_of_new_function(&mut self, func: FuncId);
    fn notify_will_delete_function(&mut self, func: FuncId);
}

/// A notifier that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

impl FunctionNotifier for NoopNotifier {
    fn notify_of_new_function(&mut self, _func: FuncId) {}
    fn notify_will_delete_function(&mut self, _func: FuncId) {}
}

// ── Function table ──────────────────────────────────────────────────

/// Functions of a module, addressable by id and by name.
///
/// Erased slots stay empty so `FuncId`s are never reused.
#[derive(Clone, Debug, Default)]
pub struct FunctionTable {
    funcs: Vec<Option<Function>>,
    by_name: FxHashMap<String, FuncId>,
}

impl FunctionTable {
    /// # Panics
    /// Panics if a function with the same name exists.
    pub fn add(&mut self, func: Function) -> FuncId {
        let id = FuncId::from_index(self.funcs.len());
        let prev = self.by_name.insert(func.name.clone(), id);
        assert!(prev.is_none(), "duplicate function name `{}`", func.name);
        self.funcs.push(Some(func));
        id
    }

    pub fn contains(&self, id: FuncId) -> bool {
        matches!(self.funcs.get(id.index()), Some(Some(_)))
    }

    /// # Panics
    /// Panics if the function was erased.
    pub fn get(&self, id: FuncId) -> &Function {
        self.funcs
            .get(id.index())
            .and_then(Option::as_ref)
            .unwrap_or_else(|| panic!("{id} is not a live function"))
    }

    pub fn get_mut(&mut self, id: FuncId) -> &mut Function {
        self.funcs
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("{id} is not a live function"))
    }

    /// Borrow two distinct functions at once.
    ///
    /// # Panics
    /// Panics if `a == b` or either was erased.
    pub fn pair_mut(&mut self, a: FuncId, b: FuncId) -> (&mut Function, &mut Function) {
        assert_ne!(a, b, "pair_mut needs two distinct functions");
        let (lo, hi, swapped) = if a < b { (a, b, false) } else { (b, a, true) };
        let (head, tail) = self.funcs.split_at_mut(hi.index());
        let lo_fn = head[lo.index()]
            .as_mut()
            .unwrap_or_else(|| panic!("{lo} is not a live function"));
        let hi_fn = tail[0]
            .as_mut()
            .unwrap_or_else(|| panic!("{hi} is not a live function"));
        if swapped {
            (hi_fn, lo_fn)
        } else {
            (lo_fn, hi_fn)
        }
    }

    pub fn lookup(&self, name: &str) -> Option<FuncId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Live functions in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.funcs
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.as_ref().map(|f| (FuncId::from_index(i), f)))
    }

    fn take(&mut self, id: FuncId) -> Function {
        let func = self
            .funcs
            .get_mut(id.index())
            .and_then(Option::take)
            .unwrap_or_else(|| panic!("{id} is not a live function"));
        self.by_name.remove(&func.name);
        func
    }
}

// ── Debug scopes ────────────────────────────────────────────────────

/// What a debug scope is nested in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScopeParent {
    Function(FuncId),
    Scope(ScopeId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DebugScope {
    pub loc: SourceLoc,
    pub parent: ScopeParent,
    /// Call-site scope when this scope was inlined.
    pub inlined_at: Option<ScopeId>,
}

impl DebugScope {
    pub const fn new(loc: SourceLoc, parent: ScopeParent) -> Self {
        Self {
            loc,
            parent,
            inlined_at: None,
        }
    }

    #[must_use]
    pub const fn inlined_at(mut self, at: ScopeId) -> Self {
        self.inlined_at = Some(at);
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct ScopeTable {
    scopes: Vec<DebugScope>,
}

impl ScopeTable {
    pub fn add(&mut self, scope: DebugScope) -> ScopeId {
        let id = ScopeId::from_index(self.scopes.len());
        self.scopes.push(scope);
        id
    }

    #[inline]
    pub fn get(&self, id: ScopeId) -> &DebugScope {
        &self.scopes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// The function at the root of `id`'s parent chain.
    pub fn root_function(&self, id: ScopeId) -> FuncId {
        let mut cur = id;
        loop {
            match self.get(cur).parent {
                ScopeParent::Function(f) => return f,
                ScopeParent::Scope(s) => cur = s,
            }
        }
    }
}

// ── Module ──────────────────────────────────────────────────────────

/// Module-level facts used by lowering and specialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModuleConfig {
    pub module: ModuleId,
    /// Every declaration in the program is visible.
    pub whole_module: bool,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            module: ModuleId::MAIN,
            whole_module: false,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Module {
    pub pool: Pool,
    pub functions: FunctionTable,
    pub scopes: ScopeTable,
    pub config: ModuleConfig,
}

impl Module {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ModuleConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a function and tell the pass manager about it.
    pub fn add_function(&mut self, func: Function, notifier: &mut dyn FunctionNotifier) -> FuncId {
        let id = self.functions.add(func);
        tracing::trace!(func = %id, name = %self.functions.get(id).name, "added function");
        notifier.notify_of_new_function(id);
        id
    }

    /// Remove a function. The notifier runs before the function is dropped.
    pub fn erase_function(&mut self, id: FuncId, notifier: &mut dyn FunctionNotifier) -> Function {
        notifier.notify_will_delete_function(id);
        let func = self.functions.take(id);
        tracing::trace!(func = %id, name = %func.name, "erased function");
        func
    }
}
