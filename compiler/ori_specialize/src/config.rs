//! Specializer options.

use ori_ssa::ModuleConfig;

/// Knobs for [`GenericSpecializer`](crate::GenericSpecializer).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpecializeConfig {
    /// Whole-program facts are available (closed class hierarchies,
    /// visibility into every module's types).
    pub whole_module: bool,
    /// Verify every specialized body and panic on failure.
    pub verify: bool,
    /// Specialize `partial_apply` sites that need no thunk.
    pub specialize_partial_apply: bool,
}

impl Default for SpecializeConfig {
    fn default() -> Self {
        Self {
            whole_module: false,
            verify: cfg!(debug_assertions),
            specialize_partial_apply: true,
        }
    }
}

impl SpecializeConfig {
    /// Options matching a module's own facts.
    pub fn for_module(config: ModuleConfig) -> Self {
        Self {
            whole_module: config.whole_module,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn whole_module(mut self, on: bool) -> Self {
        self.whole_module = on;
        self
    }

    #[must_use]
    pub fn verify(mut self, on: bool) -> Self {
        self.verify = on;
        self
    }

    #[must_use]
    pub fn specialize_partial_apply(mut self, on: bool) -> Self {
        self.specialize_partial_apply = on;
        self
    }
}
