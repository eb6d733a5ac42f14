//! Orphan collector: deletes translation records whose source object is gone.

use crate::cancel::CancelFlag;
use crate::error::{Result, TranslationError};
use crate::model::{Criteria, ObjectId, RecordFilter, TranslationRecord, TypeRef};
use crate::objects::ObjectStore;
use crate::schema::TypeRegistry;
use crate::store::TranslationStore;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_PAGE_SIZE: usize = 200;

/// Outcome of a sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    /// One configuration error per type that could not be resolved. Records
    /// of those types are kept.
    pub errors: Vec<TranslationError>,
}

pub struct OrphanCollector {
    store: Arc<dyn TranslationStore>,
    objects: Arc<dyn ObjectStore>,
    types: Arc<TypeRegistry>,
    page_size: usize,
}

impl OrphanCollector {
    pub fn new(
        store: Arc<dyn TranslationStore>,
        objects: Arc<dyn ObjectStore>,
        types: Arc<TypeRegistry>,
    ) -> Self {
        Self {
            store,
            objects,
            types,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Delete every record whose source object no longer exists.
    ///
    /// With `criteria`, an object only counts as existing when it also matches
    /// them. Records of unresolvable types are never deleted.
    pub async fn sweep(&self, criteria: Option<&Criteria>, cancel: &CancelFlag) -> Result<SweepReport> {
        let criteria = criteria.cloned().unwrap_or_default();
        let mut existence: HashMap<(TypeRef, ObjectId), bool> = HashMap::new();
        let mut unresolved: BTreeSet<TypeRef> = BTreeSet::new();
        let mut report = SweepReport::default();

        info!("Starting orphan sweep");

        let mut after = None;
        loop {
            cancel.check()?;
            let page = self
                .store
                .query(&RecordFilter::all().page(after, self.page_size))
                .await?;
            let Some(last) = page.last() else { break };
            after = last.id;
            let full_page = page.len() == self.page_size;

            for record in page {
                report.scanned += 1;
                let type_ref = record.key.type_ref();

                if self.types.resolve_ref(&type_ref).is_none() {
                    if unresolved.insert(type_ref.clone()) {
                        warn!("Type {} cannot be resolved, keeping its translations", type_ref);
                        report.errors.push(TranslationError::configuration(
                            type_ref.to_string(),
                            &record.key.field,
                            "type is not registered",
                        ));
                    }
                    continue;
                }

                let cache_key = (type_ref, record.key.object_id);
                let exists = match existence.get(&cache_key) {
                    Some(exists) => *exists,
                    None => {
                        let exists = self
                            .objects
                            .exists(&cache_key.0, &criteria.with_id(cache_key.1))
                            .await?;
                        existence.insert(cache_key, exists);
                        exists
                    }
                };

                if !exists && self.remove(&record).await? {
                    report.removed += 1;
                }
            }

            if !full_page {
                break;
            }
        }

        info!(
            "Orphan sweep finished: {} scanned, {} removed, {} unresolved types",
            report.scanned,
            report.removed,
            report.errors.len()
        );
        Ok(report)
    }

    /// Delete records whose field is no longer declared translatable by its type.
    ///
    /// Records of unresolvable types are kept.
    pub async fn prune_undeclared_fields(&self, cancel: &CancelFlag) -> Result<SweepReport> {
        let mut unresolved: BTreeSet<TypeRef> = BTreeSet::new();
        let mut report = SweepReport::default();

        let mut after = None;
        loop {
            cancel.check()?;
            let page = self
                .store
                .query(&RecordFilter::all().page(after, self.page_size))
                .await?;
            let Some(last) = page.last() else { break };
            after = last.id;
            let full_page = page.len() == self.page_size;

            for record in page {
                report.scanned += 1;
                let type_ref = record.key.type_ref();

                let Some(descriptor) = self.types.resolve_ref(&type_ref) else {
                    if unresolved.insert(type_ref.clone()) {
                        warn!("Type {} cannot be resolved, keeping its translations", type_ref);
                        report.errors.push(TranslationError::configuration(
                            type_ref.to_string(),
                            &record.key.field,
                            "type is not registered",
                        ));
                    }
                    continue;
                };

                if !descriptor.is_translatable(&record.key.field) && self.remove(&record).await? {
                    report.removed += 1;
                }
            }

            if !full_page {
                break;
            }
        }

        info!(
            "Pruned {} translations of undeclared fields ({} scanned)",
            report.removed, report.scanned
        );
        Ok(report)
    }

    async fn remove(&self, record: &TranslationRecord) -> Result<bool> {
        let Some(id) = record.id else {
            return Ok(false);
        };
        let deleted = self.store.delete(id).await?;
        if deleted {
            debug!("Deleted orphan translation #{} {}", id, record.key);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreResult;
    use crate::i18n::Language;
    use crate::model::{RecordId, SourceObject, TranslationKey};
    use crate::objects::MemoryObjectStore;
    use crate::schema::TypeDescriptor;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    // ==================== Helper Functions ====================

    fn article_ref() -> TypeRef {
        TypeRef::new("blog.models", "Article")
    }

    fn types() -> Arc<TypeRegistry> {
        Arc::new(TypeRegistry::with_types([TypeDescriptor::new(
            "blog.models",
            "Article",
        )
        .fields(["title", "body", "status"])
        .translatable(["title"])]))
    }

    fn article(id: ObjectId, status: &str) -> SourceObject {
        SourceObject::new(article_ref(), id)
            .with("title", format!("Article {}", id))
            .with("status", status)
    }

    async fn seed(store: &MemoryStore, namespace: &str, type_name: &str, object_id: ObjectId, field: &str) -> TranslationRecord {
        let key = TranslationKey::new(
            namespace,
            type_name,
            object_id,
            field,
            Language::parse("fr").unwrap(),
        )
        .unwrap();
        store
            .save(TranslationRecord::new(key, "text"))
            .await
            .expect("Should save record")
    }

    fn collector(store: &MemoryStore, objects: &MemoryObjectStore) -> OrphanCollector {
        OrphanCollector::new(Arc::new(store.clone()), Arc::new(objects.clone()), types())
    }

    // ==================== Sweep Tests ====================

    #[tokio::test]
    async fn test_sweep_removes_only_orphans() {
        let store = MemoryStore::new();
        let objects = MemoryObjectStore::new();
        objects.insert(article(1, "published")).unwrap();

        let kept = seed(&store, "blog.models", "Article", 1, "title").await;
        let orphan = seed(&store, "blog.models", "Article", 2, "title").await;

        let report = collector(&store, &objects)
            .sweep(None, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(report.removed, 1);
        assert_eq!(report.scanned, 2);
        assert!(store.get(kept.id.unwrap()).await.unwrap().is_some());
        assert!(store.get(orphan.id.unwrap()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_keeps_records_of_unresolved_types() {
        let store = MemoryStore::new();
        let objects = MemoryObjectStore::new();
        let record = seed(&store, "legacy", "Page", 3, "title").await;
        seed(&store, "legacy", "Page", 4, "title").await;

        let report = collector(&store, &objects)
            .sweep(None, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(report.removed, 0);
        assert_eq!(report.errors.len(), 1, "One error per unresolved type");
        assert!(store.get(record.id.unwrap()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sweep_with_criteria() {
        let store = MemoryStore::new();
        let objects = MemoryObjectStore::new();
        objects.insert(article(1, "published")).unwrap();
        objects.insert(article(2, "draft")).unwrap();
        let published = seed(&store, "blog.models", "Article", 1, "title").await;
        let draft = seed(&store, "blog.models", "Article", 2, "title").await;

        let criteria = Criteria::new().with("status", "published");
        let report = collector(&store, &objects)
            .sweep(Some(&criteria), &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(report.removed, 1);
        assert!(store.get(published.id.unwrap()).await.unwrap().is_some());
        assert!(store.get(draft.id.unwrap()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_pages_through_deletions() {
        let store = MemoryStore::new();
        let objects = MemoryObjectStore::new();
        for id in 1..=7 {
            if id % 2 == 0 {
                objects.insert(article(id, "published")).unwrap();
            }
            seed(&store, "blog.models", "Article", id, "title").await;
        }

        let report = collector(&store, &objects)
            .with_page_size(2)
            .sweep(None, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(report.scanned, 7);
        assert_eq!(report.removed, 4);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_sweep_cancelled_before_start() {
        let store = MemoryStore::new();
        let objects = MemoryObjectStore::new();
        seed(&store, "blog.models", "Article", 1, "title").await;

        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = collector(&store, &objects).sweep(None, &cancel).await;

        assert!(matches!(result, Err(TranslationError::Cancelled)));
        assert_eq!(store.len(), 1);
    }

    /// Memory store that raises a cancel flag once a page has been read.
    struct CancellingStore {
        inner: MemoryStore,
        cancel: CancelFlag,
    }

    #[async_trait]
    impl TranslationStore for CancellingStore {
        async fn get(&self, id: RecordId) -> StoreResult<Option<TranslationRecord>> {
            self.inner.get(id).await
        }
        async fn find(&self, key: &TranslationKey) -> StoreResult<Option<TranslationRecord>> {
            self.inner.find(key).await
        }
        async fn save(&self, record: TranslationRecord) -> StoreResult<TranslationRecord> {
            self.inner.save(record).await
        }
        async fn save_all(&self, records: Vec<TranslationRecord>) -> StoreResult<Vec<TranslationRecord>> {
            self.inner.save_all(records).await
        }
        async fn delete(&self, id: RecordId) -> StoreResult<bool> {
            self.inner.delete(id).await
        }
        async fn query(&self, filter: &RecordFilter) -> StoreResult<Vec<TranslationRecord>> {
            let page = self.inner.query(filter).await?;
            self.cancel.cancel();
            Ok(page)
        }
        async fn count(&self, filter: &RecordFilter) -> StoreResult<usize> {
            self.inner.count(filter).await
        }
    }

    #[tokio::test]
    async fn test_sweep_cancelled_after_first_page() {
        let store = MemoryStore::new();
        let objects = MemoryObjectStore::new();
        let mut seeded = Vec::new();
        for id in 1..=5 {
            seeded.push(seed(&store, "blog.models", "Article", id, "title").await);
        }

        let cancel = CancelFlag::new();
        let cancelling = Arc::new(CancellingStore {
            inner: store.clone(),
            cancel: cancel.clone(),
        });
        let result = OrphanCollector::new(cancelling, Arc::new(objects.clone()), types())
            .with_page_size(2)
            .sweep(None, &cancel)
            .await;

        assert!(matches!(result, Err(TranslationError::Cancelled)));
        assert_eq!(store.len(), 3, "First page stays deleted");
        for record in &seeded[..2] {
            assert!(store.get(record.id.unwrap()).await.unwrap().is_none());
        }
        for record in &seeded[2..] {
            assert!(store.get(record.id.unwrap()).await.unwrap().is_some());
        }
    }

    // ==================== Prune Tests ====================

    #[tokio::test]
    async fn test_prune_undeclared_fields() {
        let store = MemoryStore::new();
        let objects = MemoryObjectStore::new();
        objects.insert(article(1, "published")).unwrap();
        let title = seed(&store, "blog.models", "Article", 1, "title").await;
        let body = seed(&store, "blog.models", "Article", 1, "body").await;
        let legacy = seed(&store, "legacy", "Page", 1, "body").await;

        let report = collector(&store, &objects)
            .prune_undeclared_fields(&CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(report.removed, 1);
        assert!(store.get(title.id.unwrap()).await.unwrap().is_some());
        assert!(store.get(body.id.unwrap()).await.unwrap().is_none());
        assert!(store.get(legacy.id.unwrap()).await.unwrap().is_some());
    }
}
