//! Type formatting for diagnostics and symbol names.

use std::fmt::Write;

use crate::{Idx, Pool, Tag};

impl Pool {
    /// Human-readable rendering of a type.
    pub fn format_type(&self, idx: Idx) -> String {
        let mut buf = String::new();
        self.format_into(idx, &mut buf);
        buf
    }

    fn format_list(&self, items: &[Idx], buf: &mut String) {
        for (i, &item) in items.iter().enumerate() {
            if i > 0 {
                buf.push_str(", ");
            }
            self.format_into(item, buf);
        }
    }

    fn format_into(&self, idx: Idx, buf: &mut String) {
        if let Some(name) = idx.name() {
            buf.push_str(name);
            return;
        }
        match self.tag(idx) {
            Tag::Address => {
                buf.push('*');
                self.format_into(self.child(idx), buf);
            }
            Tag::Metatype => {
                self.format_into(self.child(idx), buf);
                buf.push_str(".Type");
            }
            Tag::Optional => {
                self.format_into(self.child(idx), buf);
                buf.push('?');
            }
            Tag::Tuple => {
                buf.push('(');
                self.format_list(&self.tuple_elems(idx), buf);
                buf.push(')');
            }
            Tag::Function => {
                buf.push('(');
                self.format_list(&self.function_params(idx), buf);
                buf.push_str(") -> ");
                self.format_into(self.function_return(idx), buf);
            }
            Tag::Struct | Tag::Enum | Tag::Class => {
                buf.push_str(&self.registry().nominal(self.nominal_decl(idx)).name);
                self.format_args(idx, buf);
            }
            Tag::Opaque => {
                buf.push_str("some ");
                buf.push_str(&self.registry().opaque(self.opaque_decl(idx)).name);
                self.format_args(idx, buf);
            }
            Tag::Existential => {
                buf.push_str("any ");
                for (i, p) in self.existential_protocols(idx).into_iter().enumerate() {
                    if i > 0 {
                        buf.push_str(" & ");
                    }
                    buf.push_str(&self.registry().protocol(p).name);
                }
            }
            Tag::GenericParam => {
                let key = self.generic_param_key(idx);
                let _ = write!(buf, "τ_{}_{}", key.depth, key.index);
            }
            tag => buf.push_str(tag.name()),
        }
    }

    fn format_args(&self, idx: Idx, buf: &mut String) {
        let args = self.generic_args(idx);
        if !args.is_empty() {
            buf.push('<');
            self.format_list(&args, buf);
            buf.push('>');
        }
    }

    /// Compact identifier-safe encoding of a type, used in symbol names.
    pub fn mangle_type(&self, idx: Idx) -> String {
        let mut buf = String::new();
        self.mangle_into(idx, &mut buf);
        buf
    }

    fn mangle_ident(name: &str, buf: &mut String) {
        let _ = write!(buf, "{}{name}", name.len());
    }

    fn mangle_into(&self, idx: Idx, buf: &mut String) {
        match self.tag(idx) {
            Tag::Bool => buf.push_str("Sb"),
            Tag::Int8 => buf.push_str("s4Int8V"),
            Tag::Int32 => buf.push_str("s5Int32V"),
            Tag::Int64 => buf.push_str("Si"),
            Tag::Float64 => buf.push_str("Sd"),
            Tag::Unit => buf.push_str("yt"),
            Tag::Never => buf.push_str("s5NeverO"),
            Tag::RawPointer => buf.push_str("Bp"),
            Tag::NativeObject => buf.push_str("Bo"),
            Tag::Any => buf.push_str("yp"),
            Tag::Address => {
                self.mangle_into(self.child(idx), buf);
                buf.push_str("Sp");
            }
            Tag::Metatype => {
                self.mangle_into(self.child(idx), buf);
                buf.push_str("Xm");
            }
            Tag::Optional => {
                self.mangle_into(self.child(idx), buf);
                buf.push_str("Sg");
            }
            Tag::Tuple => {
                for (i, e) in self.tuple_elems(idx).into_iter().enumerate() {
                    self.mangle_into(e, buf);
                    buf.push_str(if i == 0 { "_" } else { "" });
                }
                buf.push('t');
            }
            Tag::Function => {
                let params = self.function_params(idx);
                if params.is_empty() {
                    buf.push_str("yt");
                }
                for p in params {
                    self.mangle_into(p, buf);
                }
                buf.push('_');
                self.mangle_into(self.function_return(idx), buf);
                buf.push('c');
            }
            Tag::Struct | Tag::Enum | Tag::Class => {
                let tag = self.tag(idx);
                Self::mangle_ident(&self.registry().nominal(self.nominal_decl(idx)).name, buf);
                buf.push(match tag {
                    Tag::Struct => 'V',
                    Tag::Enum => 'O',
                    _ => 'C',
                });
                self.mangle_args(idx, buf);
            }
            Tag::Opaque => {
                Self::mangle_ident(&self.registry().opaque(self.opaque_decl(idx)).name, buf);
                self.mangle_args(idx, buf);
                buf.push_str("Qo");
            }
            Tag::Existential => {
                for p in self.existential_protocols(idx) {
                    Self::mangle_ident(&self.registry().protocol(p).name, buf);
                    buf.push('P');
                }
                buf.push('p');
            }
            Tag::GenericParam => {
                let key = self.generic_param_key(idx);
                let _ = write!(buf, "qd{}_{}_", key.depth, key.index);
            }
        }
    }

    fn mangle_args(&self, idx: Idx, buf: &mut String) {
        let args = self.generic_args(idx);
        if !args.is_empty() {
            for a in args {
                self.mangle_into(a, buf);
            }
            buf.push('G');
        }
    }
}
