use super::*;

#[test]
fn flags_size() {
    assert_eq!(std::mem::size_of::<TypeFlags>(), 4);
}

#[test]
fn propagate_from_drops_categories() {
    let child = TypeFlags::HAS_TYPE_PARAM | TypeFlags::NEEDS_SUBST | TypeFlags::IS_CLASS;
    let propagated = TypeFlags::propagate_from(child);

    assert!(propagated.has_type_params());
    assert!(propagated.needs_subst());
    assert!(!propagated.contains(TypeFlags::IS_CLASS));
}

#[test]
fn propagate_all_unions_children() {
    let flags = TypeFlags::propagate_all([
        TypeFlags::HAS_OPAQUE,
        TypeFlags::IS_PRIMITIVE,
        TypeFlags::HAS_EXISTENTIAL,
    ]);
    assert_eq!(flags, TypeFlags::HAS_OPAQUE | TypeFlags::HAS_EXISTENTIAL);
}
