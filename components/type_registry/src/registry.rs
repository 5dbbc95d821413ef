//! Type registry
//!
//! Types are stored in registration order and found by linear scan; programs
//! register a handful of types once and then mostly hit the inline caches.
//! Every ancestor walk is bounded by the number of registered types, so a
//! malformed parent cycle terminates.

use std::collections::HashMap;

use crate::inline_cache::{CallSiteId, InlineCache};
use crate::type_info::TypeInfo;

/// Registered types plus the per-call-site dispatch caches.
///
/// # Example
///
/// ```
/// use core_types::name_hash;
/// use type_registry::{TypeInfo, TypeRegistry};
///
/// let mut registry = TypeRegistry::new();
/// registry.register_type(TypeInfo::new(0, "Animal").with_method("speak", 1));
/// registry.register_type(TypeInfo::new(1, "Dog").with_parent(0));
///
/// let dog = registry.get_type(1).unwrap();
/// assert_eq!(registry.lookup_method(dog, name_hash(b"speak")), Some(1));
/// assert!(registry.is_subtype(dog, 0));
/// ```
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: Vec<TypeInfo>,
    caches: HashMap<CallSiteId, InlineCache>,
    ancestor_walks: u64,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a type. Types are never unregistered.
    pub fn register_type(&mut self, info: TypeInfo) {
        log::debug!(
            "registered type {} '{}' (parent {:?}, {} fields, {} methods)",
            info.type_id,
            info.name,
            info.parent(),
            info.fields.len(),
            info.vtable.len()
        );
        self.types.push(info);
    }

    /// Type with the given id.
    pub fn get_type(&self, type_id: u32) -> Option<&TypeInfo> {
        self.types.iter().find(|info| info.type_id == type_id)
    }

    /// `info` followed by its ancestors, nearest first.
    pub fn ancestors<'a>(&'a self, info: &'a TypeInfo) -> Ancestors<'a> {
        Ancestors {
            registry: self,
            next: Some(info),
            remaining: self.types.len() + 1,
        }
    }

    /// Resolve a method by walking the parent chain.
    pub fn lookup_method(&self, info: &TypeInfo, name_hash: u32) -> Option<u16> {
        self.ancestors(info)
            .find_map(|ancestor| ancestor.vtable.find(name_hash))
    }

    /// Resolve a method through the call site's inline cache.
    ///
    /// A hit bumps the entry's hit count. A miss walks the ancestors and, if
    /// the method exists, caches it; unresolved lookups are not cached.
    pub fn lookup_method_cached(
        &mut self,
        type_id: u32,
        name_hash: u32,
        call_site: CallSiteId,
    ) -> Option<u16> {
        if let Some(method) = self
            .caches
            .get_mut(&call_site)
            .and_then(|cache| cache.lookup(type_id))
        {
            return Some(method);
        }

        let resolved = {
            let info = self.get_type(type_id)?;
            self.lookup_method(info, name_hash)
        };
        self.ancestor_walks += 1;

        let method = resolved?;
        log::trace!(
            "call site {} caches type {} -> method {}",
            call_site,
            type_id,
            method
        );
        self.caches
            .entry(call_site)
            .or_default()
            .insert(type_id, method);
        Some(method)
    }

    /// Slot of one of the type's own fields. Inherited fields are not
    /// searched.
    pub fn lookup_field(&self, info: &TypeInfo, name_hash: u32) -> Option<u16> {
        info.field(name_hash).map(|field| field.offset)
    }

    /// Whether `target_type_id` is `info` itself or one of its ancestors.
    pub fn is_subtype(&self, info: &TypeInfo, target_type_id: u32) -> bool {
        self.ancestors(info)
            .any(|ancestor| ancestor.type_id == target_type_id)
    }

    /// Whether the type itself declares the trait. Parent traits are not
    /// searched.
    pub fn implements_trait(&self, info: &TypeInfo, trait_id: u32) -> bool {
        info.traits.contains(&trait_id)
    }

    /// Cache for a call site, if it has dispatched at least once
    pub fn inline_cache(&self, call_site: CallSiteId) -> Option<&InlineCache> {
        self.caches.get(&call_site)
    }

    /// Number of cache misses that walked the ancestor chain
    pub fn ancestor_walks(&self) -> u64 {
        self.ancestor_walks
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no types are registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered types in registration order
    pub fn iter(&self) -> std::slice::Iter<'_, TypeInfo> {
        self.types.iter()
    }
}

/// Iterator over a type and its ancestors. See [`TypeRegistry::ancestors`].
#[derive(Debug)]
pub struct Ancestors<'a> {
    registry: &'a TypeRegistry,
    next: Option<&'a TypeInfo>,
    remaining: usize,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a TypeInfo;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next.take()?;
        self.remaining -= 1;
        self.next = current
            .parent()
            .and_then(|parent| self.registry.get_type(parent));
        Some(current)
    }
}
