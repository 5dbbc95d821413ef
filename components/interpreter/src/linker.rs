//! Builds the runtime type registry from a program image
//!
//! Every class becomes one [`TypeInfo`] whose type id is its class index:
//!
//! - the parent is the super class; a super class flagged `TRAIT` is also
//!   recorded as a declared trait
//! - fields come from the `FieldRef` constants naming the class, in pool
//!   order, padded with anonymous slots up to the declared field count
//! - methods named `Owner.method` land in `Owner`'s vtable as `method`

use std::borrow::Cow;

use bytecode_system::{class_flags, Constant, ProgramImage};
use core_types::name_hash;
use type_registry::{TypeInfo, TypeRegistry};

/// A program's type registry plus the resolved member-name hashes.
#[derive(Debug)]
pub struct Linkage {
    /// Registry with one type per class
    pub registry: TypeRegistry,
    member_hashes: Vec<Option<u32>>,
}

impl Linkage {
    /// Name hash of the `FieldRef` or `MethodRef` at `constant`.
    pub fn member_hash(&self, constant: u16) -> Option<u32> {
        self.member_hashes
            .get(usize::from(constant))
            .copied()
            .flatten()
    }
}

/// Link a program.
pub fn link(program: &ProgramImage) -> Linkage {
    let mut registry = TypeRegistry::new();
    warn_unaddressable("class", program.classes.len());
    warn_unaddressable("method", program.methods.len());

    for (class_index, class) in (0..=u16::MAX).zip(&program.classes) {
        let name = program
            .constants
            .utf8(class.name_index)
            .map_or_else(|| format!("class#{class_index}"), Cow::into_owned);
        let mut info = TypeInfo::new(u32::from(class_index), name);

        if let Some(parent) = class.super_class() {
            info = info.with_parent(u32::from(parent));
            let parent_is_trait = program
                .class(parent)
                .is_some_and(|parent| parent.has_flag(class_flags::TRAIT));
            if parent_is_trait {
                info = info.with_trait(u32::from(parent));
            }
        }
        info.is_abstract = class.has_flag(class_flags::ABSTRACT);
        info.is_final = class.has_flag(class_flags::FINAL);
        info.is_generic = class.has_flag(class_flags::GENERIC);
        info.is_trait = class.has_flag(class_flags::TRAIT);

        for constant in program.constants.iter() {
            let Constant::FieldRef {
                class_index: owner,
                name_index,
            } = *constant
            else {
                continue;
            };
            if owner != class_index {
                continue;
            }
            let Some(field) = program.constants.utf8_bytes(name_index) else {
                continue;
            };
            if info.field(name_hash(field)).is_none() {
                info.add_field(&String::from_utf8_lossy(field));
            }
        }
        while info.field_count() < usize::from(class.field_count) {
            let slot = info.field_count();
            info.add_field(&format!("${slot}"));
        }

        let prefix = format!("{}.", info.name);
        for (method_index, method) in (0..=u16::MAX).zip(&program.methods) {
            let bound = program
                .constants
                .utf8(method.name_index)
                .and_then(|name| name.strip_prefix(&prefix).map(str::to_owned));
            if let Some(method_name) = bound {
                info.vtable.insert(&method_name, method_index);
            }
        }

        registry.register_type(info);
    }

    let member_hashes = program
        .constants
        .iter()
        .map(|constant| match *constant {
            Constant::FieldRef { name_index, .. } | Constant::MethodRef { name_index, .. } => {
                program.constants.utf8_bytes(name_index).map(name_hash)
            }
            _ => None,
        })
        .collect();

    Linkage {
        registry,
        member_hashes,
    }
}

/// Tables are addressed by u16 indices; entries past that range are skipped.
fn warn_unaddressable(table: &str, len: usize) {
    let addressable = usize::from(u16::MAX) + 1;
    if len > addressable {
        log::warn!(
            "{} {} entries past index {} cannot be addressed and were not linked",
            len - addressable,
            table,
            u16::MAX
        );
    }
}
