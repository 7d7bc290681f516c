//! Specialization cache and per-run context.
//!
//! The cache maps canonical mangled names to specialized functions. It is
//! append-only: a name, once registered, always resolves to the same
//! function.

use rustc_hash::FxHashMap;

use ori_ssa::FuncId;

#[derive(Clone, Debug, Default)]
pub struct SpecializationCache {
    entries: FxHashMap<String, FuncId>,
}

impl SpecializationCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<FuncId> {
        self.entries.get(name).copied()
    }

    /// Register `name` for `func`.
    ///
    /// # Panics
    /// Panics if `name` is already registered for a different function.
    pub fn insert(&mut self, name: impl Into<String>, func: FuncId) {
        let name = name.into();
        if let Some(&existing) = self.entries.get(&name) {
            assert_eq!(
                existing, func,
                "specialization `{name}` registered for {existing} and {func}"
            );
            return;
        }
        self.entries.insert(name, func);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by name.
    pub fn entries(&self) -> Vec<(&str, FuncId)> {
        let mut entries: Vec<_> = self.entries.iter().map(|(n, &f)| (n.as_str(), f)).collect();
        entries.sort_unstable();
        entries
    }
}

/// Counters for one specialization run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpecializeStats {
    pub created: usize,
    pub reused: usize,
    pub rejected: usize,
    /// Instructions folded away while cloning bodies.
    pub folded: usize,
}

/// State shared across call sites: the cache plus the functions created so
/// far, which the caller typically feeds back as new work.
#[derive(Clone, Debug, Default)]
pub struct SpecializationContext {
    pub cache: SpecializationCache,
    /// `(original, specialized)` in creation order.
    pub new_functions: Vec<(FuncId, FuncId)>,
    pub stats: SpecializeStats,
}

impl SpecializationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the functions created since the last call.
    pub fn take_new_functions(&mut self) -> Vec<(FuncId, FuncId)> {
        std::mem::take(&mut self.new_functions)
    }
}
