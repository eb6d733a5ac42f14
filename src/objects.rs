//! Object store: read access to the live domain objects owning translatable text.
//!
//! The engine never writes domain objects. Hosts implement [`ObjectStore`] over
//! their own persistence; [`MemoryObjectStore`] serves tests and embedding.

use crate::error::{StoreError, StoreResult};
use crate::model::{Criteria, ObjectId, SourceObject, TypeRef};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// A bounded window over a query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn first(limit: usize) -> Self {
        Self { offset: 0, limit }
    }

    pub fn next(self) -> Self {
        Self {
            offset: self.offset + self.limit,
            limit: self.limit,
        }
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one object.
    async fn get(&self, type_ref: &TypeRef, id: ObjectId) -> StoreResult<Option<SourceObject>>;

    /// Objects of `type_ref` matching `criteria`, ordered by id, restricted to `page`.
    async fn query(
        &self,
        type_ref: &TypeRef,
        criteria: &Criteria,
        page: Page,
    ) -> StoreResult<Vec<SourceObject>>;

    /// Whether any object of `type_ref` matches `criteria`.
    async fn exists(&self, type_ref: &TypeRef, criteria: &Criteria) -> StoreResult<bool>;
}

type Objects = BTreeMap<TypeRef, BTreeMap<ObjectId, SourceObject>>;

/// Mutex-guarded in-memory object store. Clones share the same objects.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<Objects>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Objects>> {
        self.objects.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Insert or replace an object.
    pub fn insert(&self, object: SourceObject) -> StoreResult<()> {
        self.lock()?
            .entry(object.type_ref.clone())
            .or_default()
            .insert(object.id, object);
        Ok(())
    }

    /// Remove an object. Returns `false` if it did not exist.
    pub fn remove(&self, type_ref: &TypeRef, id: ObjectId) -> StoreResult<bool> {
        Ok(self
            .lock()?
            .get_mut(type_ref)
            .and_then(|objects| objects.remove(&id))
            .is_some())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, type_ref: &TypeRef, id: ObjectId) -> StoreResult<Option<SourceObject>> {
        Ok(self
            .lock()?
            .get(type_ref)
            .and_then(|objects| objects.get(&id))
            .cloned())
    }

    async fn query(
        &self,
        type_ref: &TypeRef,
        criteria: &Criteria,
        page: Page,
    ) -> StoreResult<Vec<SourceObject>> {
        let objects = self.lock()?;
        Ok(objects
            .get(type_ref)
            .map(|objects| {
                objects
                    .values()
                    .filter(|object| criteria.matches(object))
                    .skip(page.offset)
                    .take(page.limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn exists(&self, type_ref: &TypeRef, criteria: &Criteria) -> StoreResult<bool> {
        let objects = self.lock()?;
        Ok(objects
            .get(type_ref)
            .is_some_and(|objects| objects.values().any(|object| criteria.matches(object))))
    }
}
