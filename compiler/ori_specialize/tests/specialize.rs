// Test code uses unwrap/expect for clarity - panics provide good test failure messages
#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Specialization engine tests.
//!
//! These drive the public API end to end: build IR with the `ori_ssa`
//! builder, run the cloner or the specializer, and check the resulting
//! functions with the verifier.
//!
//! # Organization
//!
//! - `scenarios` - Region cloning and single call-site specialization
//! - `properties` - Round trips, determinism, caching and termination
//! - `common/` - Shared fixtures
//!
//! # Running
//!
//! ```bash
//! cargo test -p ori_specialize --test specialize
//!
//! # With specializer tracing
//! RUST_LOG=ori_specialize=debug cargo test -p ori_specialize --test specialize -- --nocapture
//! ```

#[path = "specialize/common/mod.rs"]
mod common;

#[path = "specialize/scenarios.rs"]
mod scenarios;

#[path = "specialize/properties.rs"]
mod properties;
