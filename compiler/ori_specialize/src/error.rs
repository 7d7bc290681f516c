//! Reasons a call site is not specialized.
//!
//! A rejection is a normal outcome: the call site is left untouched and
//! the caller moves on.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("`{callee}` is not generic")]
    NotGeneric { callee: String },
    #[error("substitution for `{callee}` still mentions generic parameters: {subs}")]
    UnresolvedSubstitution { callee: String, subs: String },
    #[error("substitution does not match the signature of `{callee}`")]
    SignatureMismatch { callee: String },
    #[error("`{ty}` does not conform to a protocol required by `{callee}`")]
    MissingConformance { callee: String, ty: String },
    #[error("specializing `{callee}` would turn direct value `{ty}` into an address-only one")]
    RequiresBoxing { callee: String, ty: String },
    #[error("serialized specialization of `{callee}` would expose non-public type `{ty}`")]
    NotSerializable { callee: String, ty: String },
    #[error("callee of {site} is not a direct function reference")]
    IndirectCallee { site: String },
    #[error("`{callee}` has no body to clone")]
    CalleeHasNoBody { callee: String },
    #[error("partial application of `{callee}` needs a reabstraction thunk")]
    RequiresThunk { callee: String },
}
