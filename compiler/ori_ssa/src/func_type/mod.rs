//! Lowered calling-convention function types.
//!
//! A [`SilFunctionType`] records, for every formal parameter and result,
//! whether it is passed indirectly (by address) or directly (by value) and
//! with which ownership convention. The entry block of a function body
//! receives indirect results first, then parameters; indirect entries are
//! addresses.

use ori_types::{GenericSignature, Idx, Pool, SubstitutionMap};

use crate::ownership::OwnershipKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamConvention {
    /// Callee takes ownership of the value in memory.
    IndirectIn,
    /// Callee borrows the value in memory.
    IndirectInGuaranteed,
    /// Callee may read and write the memory.
    IndirectInout,
    DirectOwned,
    DirectGuaranteed,
    /// Trivial value passed in registers.
    DirectUnowned,
}

impl ParamConvention {
    #[inline]
    pub const fn is_indirect(self) -> bool {
        matches!(
            self,
            Self::IndirectIn | Self::IndirectInGuaranteed | Self::IndirectInout
        )
    }

    /// Ownership of the entry-block argument for this convention.
    pub const fn ownership(self) -> OwnershipKind {
        match self {
            Self::DirectOwned => OwnershipKind::Owned,
            Self::DirectGuaranteed => OwnershipKind::Guaranteed,
            _ => OwnershipKind::None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResultConvention {
    /// Returned through a caller-provided address.
    Indirect,
    Owned,
    /// Trivial value returned in registers.
    Unowned,
}

impl ResultConvention {
    #[inline]
    pub const fn is_indirect(self) -> bool {
        matches!(self, Self::Indirect)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SilParam {
    /// Formal (value) type; indirect params receive its address.
    pub ty: Idx,
    pub convention: ParamConvention,
}

impl SilParam {
    pub const fn new(ty: Idx, convention: ParamConvention) -> Self {
        Self { ty, convention }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SilResult {
    pub ty: Idx,
    pub convention: ResultConvention,
}

impl SilResult {
    pub const fn new(ty: Idx, convention: ResultConvention) -> Self {
        Self { ty, convention }
    }
}

/// A function's lowered signature.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SilFunctionType {
    pub generic_sig: GenericSignature,
    pub params: Vec<SilParam>,
    pub results: Vec<SilResult>,
    /// Error type of a throwing function.
    pub error: Option<Idx>,
}

impl SilFunctionType {
    pub fn new(generic_sig: GenericSignature, params: Vec<SilParam>, results: Vec<SilResult>) -> Self {
        Self {
            generic_sig,
            params,
            results,
            error: None,
        }
    }

    #[must_use]
    pub fn throwing(mut self, error: Idx) -> Self {
        self.error = Some(error);
        self
    }

    #[inline]
    pub fn is_generic(&self) -> bool {
        !self.generic_sig.is_empty()
    }

    pub fn indirect_results(&self) -> impl Iterator<Item = &SilResult> {
        self.results.iter().filter(|r| r.convention.is_indirect())
    }

    pub fn direct_results(&self) -> impl Iterator<Item = &SilResult> {
        self.results.iter().filter(|r| !r.convention.is_indirect())
    }

    pub fn num_indirect_results(&self) -> usize {
        self.indirect_results().count()
    }

    pub fn num_direct_results(&self) -> usize {
        self.direct_results().count()
    }

    /// Types of the entry-block arguments: indirect result addresses, then
    /// parameters (addresses for indirect ones).
    pub fn entry_arg_types(&self, pool: &mut Pool) -> Vec<Idx> {
        let mut tys = Vec::with_capacity(self.results.len() + self.params.len());
        for r in self.indirect_results() {
            tys.push(pool.address(r.ty));
        }
        for p in &self.params {
            tys.push(if p.convention.is_indirect() {
                pool.address(p.ty)
            } else {
                p.ty
            });
        }
        tys
    }

    /// Ownership of each entry-block argument, parallel to
    /// [`entry_arg_types`](Self::entry_arg_types).
    pub fn entry_arg_ownership(&self) -> Vec<OwnershipKind> {
        self.indirect_results()
            .map(|_| OwnershipKind::None)
            .chain(self.params.iter().map(|p| p.convention.ownership()))
            .collect()
    }

    /// Type of the value produced by a call: the single direct result, a
    /// tuple of several, or unit.
    pub fn direct_result_type(&self, pool: &mut Pool) -> Idx {
        let direct: Vec<Idx> = self.direct_results().map(|r| r.ty).collect();
        match direct.as_slice() {
            [] => Idx::UNIT,
            [single] => *single,
            many => pool.tuple(many),
        }
    }

    /// The type of a `function_ref` to a function with this signature.
    pub fn lowered_type(&self, pool: &mut Pool) -> Idx {
        let params = self.entry_arg_types(pool);
        let ret = self.direct_result_type(pool);
        pool.function(&params, ret)
    }

    /// Apply a substitution to every parameter, result and error type. The
    /// result is non-generic when `subs` binds the whole signature.
    pub fn substituted(&self, pool: &mut Pool, subs: &SubstitutionMap) -> Self {
        let fully_bound = !subs.has_type_params(pool) && subs.signature() == &self.generic_sig;
        Self {
            generic_sig: if fully_bound {
                GenericSignature::default()
            } else {
                self.generic_sig.clone()
            },
            params: self
                .params
                .iter()
                .map(|p| SilParam::new(pool.subst(p.ty, subs), p.convention))
                .collect(),
            results: self
                .results
                .iter()
                .map(|r| SilResult::new(pool.subst(r.ty, subs), r.convention))
                .collect(),
            error: self.error.map(|e| pool.subst(e, subs)),
        }
    }

    /// Whether any parameter, result or error type mentions a generic
    /// parameter.
    pub fn has_type_params(&self, pool: &Pool) -> bool {
        self.params
            .iter()
            .map(|p| p.ty)
            .chain(self.results.iter().map(|r| r.ty))
            .chain(self.error)
            .any(|ty| pool.flags(ty).has_type_params())
    }
}

#[cfg(test)]
mod tests;
