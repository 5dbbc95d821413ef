//! Runtime type descriptors
//!
//! A [`TypeInfo`] describes one class: its own fields, its vtable, the traits
//! it declares and its generic parameters. The parent is referenced by id only
//! and resolved through the registry.

use core_types::name_hash;

/// `parent_type_id` of a root type
pub const NO_PARENT: u32 = u32::MAX;

/// Instance field slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,
    /// Hash of `name`
    pub name_hash: u32,
    /// Slot index inside the instance
    pub offset: u16,
}

/// Method bound to a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VTableEntry {
    /// Unqualified method name
    pub name: String,
    /// Hash of `name`
    pub name_hash: u32,
    /// Method table index of the implementation
    pub method_index: u16,
}

/// Methods a type defines itself, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VTable {
    entries: Vec<VTableEntry>,
}

impl VTable {
    /// Add or override an entry.
    pub fn insert(&mut self, name: &str, method_index: u16) {
        let name_hash = name_hash(name.as_bytes());
        match self.entries.iter_mut().find(|e| e.name_hash == name_hash) {
            Some(existing) => existing.method_index = method_index,
            None => self.entries.push(VTableEntry {
                name: name.to_owned(),
                name_hash,
                method_index,
            }),
        }
    }

    /// Method index for a name hash.
    pub fn find(&self, name_hash: u32) -> Option<u16> {
        self.entries
            .iter()
            .find(|e| e.name_hash == name_hash)
            .map(|e| e.method_index)
    }

    /// Entries in declaration order
    pub fn entries(&self) -> &[VTableEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the vtable is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Descriptor of a registered type.
///
/// # Example
///
/// ```
/// use type_registry::{TypeInfo, NO_PARENT};
///
/// let shape = TypeInfo::new(0, "Shape")
///     .with_field("name")
///     .with_method("area", 4)
///     .mark_abstract();
///
/// assert_eq!(shape.parent(), None);
/// assert_eq!(shape.parent_type_id, NO_PARENT);
/// assert_eq!(shape.field_count(), 1);
/// assert!(shape.is_abstract);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    /// Type name
    pub name: String,
    /// Hash of `name`
    pub name_hash: u32,
    /// Registry key
    pub type_id: u32,
    /// Parent type, or [`NO_PARENT`]
    pub parent_type_id: u32,
    /// Own fields in slot order
    pub fields: Vec<FieldDescriptor>,
    /// Own methods
    pub vtable: VTable,
    /// Trait type ids declared by this type
    pub traits: Vec<u32>,
    /// Generic parameter names
    pub type_params: Vec<String>,
    /// Cannot be instantiated
    pub is_abstract: bool,
    /// Cannot be subclassed
    pub is_final: bool,
    /// Declares type parameters
    pub is_generic: bool,
    /// Is a trait declaration
    pub is_trait: bool,
}

impl TypeInfo {
    /// A root type with no members.
    pub fn new(type_id: u32, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            name_hash: name_hash(name.as_bytes()),
            name,
            type_id,
            parent_type_id: NO_PARENT,
            fields: Vec::new(),
            vtable: VTable::default(),
            traits: Vec::new(),
            type_params: Vec::new(),
            is_abstract: false,
            is_final: false,
            is_generic: false,
            is_trait: false,
        }
    }

    /// Set the parent type.
    pub fn with_parent(mut self, parent_type_id: u32) -> Self {
        self.parent_type_id = parent_type_id;
        self
    }

    /// Append a field in the next slot.
    pub fn with_field(mut self, name: &str) -> Self {
        self.add_field(name);
        self
    }

    /// Bind a method.
    pub fn with_method(mut self, name: &str, method_index: u16) -> Self {
        self.vtable.insert(name, method_index);
        self
    }

    /// Declare a trait.
    pub fn with_trait(mut self, trait_id: u32) -> Self {
        self.traits.push(trait_id);
        self
    }

    /// Declare a generic parameter; marks the type generic.
    pub fn with_type_param(mut self, name: &str) -> Self {
        self.type_params.push(name.to_owned());
        self.is_generic = true;
        self
    }

    /// Mark abstract
    pub fn mark_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Mark final
    pub fn mark_final(mut self) -> Self {
        self.is_final = true;
        self
    }

    /// Mark generic
    pub fn mark_generic(mut self) -> Self {
        self.is_generic = true;
        self
    }

    /// Mark as a trait
    pub fn mark_trait(mut self) -> Self {
        self.is_trait = true;
        self
    }

    /// Append a field and return its slot.
    pub fn add_field(&mut self, name: &str) -> u16 {
        let offset = self.fields.len() as u16;
        self.fields.push(FieldDescriptor {
            name: name.to_owned(),
            name_hash: name_hash(name.as_bytes()),
            offset,
        });
        offset
    }

    /// Parent type id, if any
    pub fn parent(&self) -> Option<u32> {
        (self.parent_type_id != NO_PARENT).then_some(self.parent_type_id)
    }

    /// Number of field slots an instance needs
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Own field with the given name hash
    pub fn field(&self, name_hash: u32) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name_hash == name_hash)
    }
}
