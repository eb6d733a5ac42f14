//! Type registry: which entity types exist and which of their fields are translatable.
//!
//! Types register themselves explicitly at process start. The registry is
//! shared read-only afterwards; [`TypeRegistry::reload`] swaps the whole set
//! at once (used by tests and by hosts that rebuild their object model).

use crate::model::TypeRef;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

/// Metadata of one source entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub type_ref: TypeRef,
    /// Every text attribute the type declares.
    pub fields: BTreeSet<String>,
    /// Subset of attributes whose values are translated.
    pub translatable_fields: BTreeSet<String>,
    /// Abstract types have no instances and are skipped by bulk updates.
    pub is_abstract: bool,
}

impl TypeDescriptor {
    pub fn new(namespace: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            type_ref: TypeRef::new(namespace, type_name),
            fields: BTreeSet::new(),
            translatable_fields: BTreeSet::new(),
            is_abstract: false,
        }
    }

    /// Declare text attributes.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Declare translatable attributes. They are expected to be declared with
    /// [`fields`](Self::fields) too; a missing declaration is a configuration
    /// error reported when the field is synchronized.
    pub fn translatable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.translatable_fields
            .extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    pub fn is_translatable(&self, field: &str) -> bool {
        self.translatable_fields.contains(field)
    }

    /// Translatable fields the type does not declare.
    pub fn undeclared_translatable_fields(&self) -> Vec<&str> {
        self.translatable_fields
            .iter()
            .filter(|field| !self.fields.contains(*field))
            .map(String::as_str)
            .collect()
    }
}

/// Registry of entity types, keyed by namespace and type name.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: RwLock<BTreeMap<TypeRef, TypeDescriptor>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_types(descriptors: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        let registry = Self::new();
        registry.reload(descriptors);
        registry
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<TypeRef, TypeDescriptor>> {
        self.types.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<TypeRef, TypeDescriptor>> {
        self.types.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register (or replace) one type.
    pub fn register(&self, descriptor: TypeDescriptor) {
        self.write().insert(descriptor.type_ref.clone(), descriptor);
    }

    /// Replace every registered type at once.
    pub fn reload(&self, descriptors: impl IntoIterator<Item = TypeDescriptor>) {
        let types: BTreeMap<TypeRef, TypeDescriptor> = descriptors
            .into_iter()
            .map(|descriptor| (descriptor.type_ref.clone(), descriptor))
            .collect();
        *self.write() = types;
    }

    /// Look up a type by namespace and name.
    pub fn resolve(&self, namespace: &str, type_name: &str) -> Option<TypeDescriptor> {
        self.resolve_ref(&TypeRef::new(namespace, type_name))
    }

    pub fn resolve_ref(&self, type_ref: &TypeRef) -> Option<TypeDescriptor> {
        self.read().get(type_ref).cloned()
    }

    /// Concrete types declaring at least one translatable field, in name order.
    pub fn translatable_types(&self) -> Vec<TypeDescriptor> {
        self.read()
            .values()
            .filter(|descriptor| !descriptor.is_abstract && !descriptor.translatable_fields.is_empty())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
