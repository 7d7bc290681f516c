//! Canonical names for specializations.
//!
//! The name doubles as the specialization-cache key, so it must be a pure
//! function of the original function and the substitution.

use std::fmt::Write as _;

use ori_types::{Pool, SubstitutionMap};

/// Derives the canonical name of a specialization.
///
/// Implementations are treated as injective; a collision is handled as a
/// cache hit.
pub trait Mangler {
    fn mangle(&self, pool: &Pool, name: &str, subs: &SubstitutionMap, serialized: bool) -> String;
}

/// `$s<len><name>Tg5<replacements>_`, with `Tgq5` for serialized
/// specializations.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultMangler;

impl Mangler for DefaultMangler {
    fn mangle(&self, pool: &Pool, name: &str, subs: &SubstitutionMap, serialized: bool) -> String {
        let mut out = String::with_capacity(name.len() + 16);
        let _ = write!(out, "$s{}{name}Tg", name.len());
        if serialized {
            out.push('q');
        }
        out.push('5');
        for &ty in subs.replacements() {
            out.push_str(&pool.mangle_type(ty));
        }
        out.push('_');
        out
    }
}
