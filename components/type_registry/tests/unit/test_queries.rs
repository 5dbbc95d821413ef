//! Subtype, trait and field queries

use core_types::name_hash;
use type_registry::{TypeInfo, TypeRegistry};

fn hierarchy() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register_type(TypeInfo::new(0, "Printable").mark_trait());
    registry.register_type(
        TypeInfo::new(1, "Animal")
            .with_field("name")
            .with_trait(0),
    );
    registry.register_type(
        TypeInfo::new(2, "Dog")
            .with_parent(1)
            .with_field("breed")
            .with_field("age"),
    );
    registry.register_type(TypeInfo::new(3, "Rock").mark_final());
    registry
}

#[test]
fn test_subtype_is_reflexive() {
    let registry = hierarchy();
    for info in registry.iter() {
        assert!(registry.is_subtype(info, info.type_id), "{}", info.name);
    }
}

#[test]
fn test_child_is_subtype_of_parent() {
    let registry = hierarchy();
    let dog = registry.get_type(2).unwrap();
    assert!(registry.is_subtype(dog, 1));
}

#[test]
fn test_unrelated_types() {
    let registry = hierarchy();
    let dog = registry.get_type(2).unwrap();
    let rock = registry.get_type(3).unwrap();
    let animal = registry.get_type(1).unwrap();
    assert!(!registry.is_subtype(dog, 3));
    assert!(!registry.is_subtype(rock, 2));
    assert!(!registry.is_subtype(animal, 2));
}

#[test]
fn test_traits_are_not_inherited() {
    let registry = hierarchy();
    let animal = registry.get_type(1).unwrap();
    let dog = registry.get_type(2).unwrap();
    assert!(registry.implements_trait(animal, 0));
    assert!(!registry.implements_trait(dog, 0));
}

#[test]
fn test_fields_are_own_only() {
    let registry = hierarchy();
    let dog = registry.get_type(2).unwrap();
    assert_eq!(registry.lookup_field(dog, name_hash(b"age")), Some(1));
    assert_eq!(registry.lookup_field(dog, name_hash(b"name")), None);
}

#[test]
fn test_get_type_absent() {
    let registry = hierarchy();
    assert!(registry.get_type(99).is_none());
    assert_eq!(registry.len(), 4);
}
