//! Structural type transformation.
//!
//! Implement [`TypeFolder`] and override the leaf hooks; the default `fold`
//! rebuilds compound types from their folded children and re-interns them.

use crate::subst::GenericParamKey;
use crate::{Idx, Pool, Tag};

/// Trait for transforming interned types via structural recursion.
///
/// ```text
/// struct Erase;
///
/// impl TypeFolder for Erase {
///     fn fold_generic_param(&mut self, _: &mut Pool, _: Idx, _: GenericParamKey) -> Idx {
///         Idx::ANY
///     }
/// }
/// ```
pub trait TypeFolder {
    /// Fold a type by dispatching on its tag.
    fn fold(&mut self, pool: &mut Pool, ty: Idx) -> Idx {
        super_fold(self, pool, ty)
    }

    /// Return `true` to leave `ty` and everything below it untouched.
    fn skip(&self, _pool: &Pool, _ty: Idx) -> bool {
        false
    }

    fn fold_generic_param(&mut self, _pool: &mut Pool, ty: Idx, _key: GenericParamKey) -> Idx {
        ty
    }

    fn fold_opaque(&mut self, pool: &mut Pool, ty: Idx) -> Idx {
        let decl = pool.opaque_decl(ty);
        let args = pool.generic_args(ty);
        let args = fold_all(self, pool, &args);
        pool.opaque(decl, &args)
    }
}

fn fold_all<F: TypeFolder + ?Sized>(folder: &mut F, pool: &mut Pool, tys: &[Idx]) -> Vec<Idx> {
    tys.iter().map(|&t| folder.fold(pool, t)).collect()
}

/// The default structural recursion behind [`TypeFolder::fold`].
pub fn super_fold<F: TypeFolder + ?Sized>(folder: &mut F, pool: &mut Pool, ty: Idx) -> Idx {
    if folder.skip(pool, ty) {
        return ty;
    }
    match pool.tag(ty) {
        Tag::GenericParam => {
            let key = pool.generic_param_key(ty);
            folder.fold_generic_param(pool, ty, key)
        }
        Tag::Opaque => folder.fold_opaque(pool, ty),
        tag @ (Tag::Address | Tag::Metatype | Tag::Optional) => {
            let child = pool.child(ty);
            let child = folder.fold(pool, child);
            pool.intern(tag, child.raw())
        }
        Tag::Tuple => {
            let elems = pool.tuple_elems(ty);
            let elems = fold_all(folder, pool, &elems);
            pool.tuple(&elems)
        }
        Tag::Function => {
            let params = pool.function_params(ty);
            let ret = pool.function_return(ty);
            let params = fold_all(folder, pool, &params);
            let ret = folder.fold(pool, ret);
            pool.function(&params, ret)
        }
        Tag::Struct | Tag::Enum | Tag::Class => {
            let decl = pool.nominal_decl(ty);
            let args = pool.generic_args(ty);
            let args = fold_all(folder, pool, &args);
            pool.nominal(decl, &args)
        }
        _ => ty,
    }
}
