//! CFG cloning and generic function specialization for the Ori SSA IR.
//!
//! This crate provides:
//!
//! - **Cast classification** ([`classify`], [`CastClassifier`]): decide
//!   statically whether a checked cast will succeed, may succeed, or will
//!   fail.
//! - **Region cloning** ([`RegionCloner`], [`CloneRules`]): duplicate a
//!   single-entry region or a whole body, with hooks to remap types and fold
//!   instructions while cloning.
//! - **Reabstraction planning** ([`ReabstractionPlan`]): which indirect
//!   parameters and results of a generic function become direct once its
//!   generic parameters are bound.
//! - **Specialization** ([`GenericSpecializer`]): clone a generic callee
//!   under a concrete substitution, cache the result by mangled name, and
//!   rewrite the call site.
//!
//! # Crate Dependencies
//!
//! `ori_specialize` works on `ori_ssa` functions and uses `ori_types` for
//! substitution and type lowering.
//!
//! # Tracing
//!
//! Specialization steps are logged under the `ori_specialize` target. See
//! [`init_tracing`].

use std::sync::Once;

pub mod cache;
pub mod cast;
pub mod cloner;
pub mod config;
pub mod driver;
pub mod error;
pub mod mangle;
pub mod reabstraction;
pub mod subst_cloner;

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "fixtures use unwrap for concise setup")]
mod test_helpers;

pub use cache::{SpecializationCache, SpecializationContext, SpecializeStats};
pub use cast::{classify, CastClassifier, CastFeasibility};
pub use cloner::{clone_function, CloneCx, CloneEnv, CloneRules, IdentityRules, RegionCloner, Visit};
pub use config::SpecializeConfig;
pub use driver::GenericSpecializer;
pub use error::Rejection;
pub use mangle::{DefaultMangler, Mangler};
pub use reabstraction::ReabstractionPlan;
pub use subst_cloner::{clone_specialized_body, inlined_scope_roots, SubstRules};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=ori_specialize=debug` or `RUST_LOG=ori_specialize=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
