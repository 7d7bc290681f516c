use super::*;

#[test]
fn tag_values_in_expected_ranges() {
    assert!((Tag::Any as u8) < 16);
    assert!((16..32).contains(&(Tag::Optional as u8)));
    assert!((48..80).contains(&(Tag::Function as u8)));
    assert!((80..96).contains(&(Tag::Opaque as u8)));
    assert!((96..112).contains(&(Tag::Existential as u8)));
    assert!((112..128).contains(&(Tag::GenericParam as u8)));
}

#[test]
fn uses_extra_is_correct() {
    assert!(!Tag::Int64.uses_extra());
    assert!(!Tag::Address.uses_extra());
    assert!(!Tag::GenericParam.uses_extra());

    assert!(Tag::Tuple.uses_extra());
    assert!(Tag::Class.uses_extra());
    assert!(Tag::Existential.uses_extra());
}

#[test]
fn nominal_excludes_opaque() {
    assert!(Tag::Struct.is_nominal());
    assert!(Tag::Class.is_nominal());
    assert!(!Tag::Opaque.is_nominal());
    assert!(!Tag::Tuple.is_nominal());
}
