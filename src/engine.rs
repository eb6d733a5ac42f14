//! Engine: wires stores, registries and components together.
//!
//! Hosts build one [`Engine`] at startup and call it from their save path
//! ([`Engine::reconcile`]), their read path ([`Engine::lookup`]) and their
//! maintenance surfaces.

use crate::bulk::{BulkReport, BulkUpdater};
use crate::cancel::CancelFlag;
use crate::catalog::{self, CatalogHeader, CatalogImporter, ImportReport};
use crate::config::Config;
use crate::editor::TranslationEditor;
use crate::error::Result;
use crate::i18n::LanguageRegistry;
use crate::lookup::TranslationLookup;
use crate::model::{ActorId, Criteria, SourceObject};
use crate::objects::ObjectStore;
use crate::orphans::{OrphanCollector, SweepReport, DEFAULT_PAGE_SIZE};
use crate::schema::TypeRegistry;
use crate::store::TranslationStore;
use crate::sync::{SyncOptions, SyncReport, Synchronizer, DEFAULT_CONTEXT};
use std::sync::Arc;
use tracing::info;

/// Tunables of an engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub page_size: usize,
    pub default_context: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            default_context: DEFAULT_CONTEXT.to_string(),
        }
    }
}

/// Outcome of [`Engine::refresh`].
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub swept: SweepReport,
    pub bulk: BulkReport,
}

pub struct Engine {
    store: Arc<dyn TranslationStore>,
    languages: Arc<LanguageRegistry>,
    sync: Arc<Synchronizer>,
    collector: Arc<OrphanCollector>,
    bulk: BulkUpdater,
    importer: CatalogImporter,
    lookup: TranslationLookup,
    editor: TranslationEditor,
    page_size: usize,
}

impl Engine {
    pub fn new(
        store: Arc<dyn TranslationStore>,
        objects: Arc<dyn ObjectStore>,
        types: Arc<TypeRegistry>,
        languages: Arc<LanguageRegistry>,
        settings: EngineSettings,
    ) -> Self {
        let sync = Arc::new(
            Synchronizer::new(store.clone(), types.clone(), languages.clone())
                .with_default_context(settings.default_context),
        );
        let collector = Arc::new(
            OrphanCollector::new(store.clone(), objects.clone(), types.clone())
                .with_page_size(settings.page_size),
        );
        let bulk = BulkUpdater::new(sync.clone(), objects, types).with_page_size(settings.page_size);

        Self {
            page_size: settings.page_size.max(1),
            importer: CatalogImporter::new(store.clone(), collector.clone(), languages.clone()),
            lookup: TranslationLookup::new(store.clone(), languages.clone()),
            editor: TranslationEditor::new(store.clone(), languages.clone()),
            store,
            languages,
            sync,
            collector,
            bulk,
        }
    }

    /// Build an engine from configuration.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn TranslationStore>,
        objects: Arc<dyn ObjectStore>,
        types: Arc<TypeRegistry>,
    ) -> Result<Self> {
        let languages = LanguageRegistry::new(config.languages.as_slice(), &config.default_language)?;
        let settings = EngineSettings {
            page_size: config.page_size,
            default_context: config.sync_context.clone(),
        };
        Ok(Self::new(store, objects, types, Arc::new(languages), settings))
    }

    pub fn languages(&self) -> &LanguageRegistry {
        &self.languages
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }

    pub fn collector(&self) -> &OrphanCollector {
        &self.collector
    }

    pub fn lookup(&self) -> &TranslationLookup {
        &self.lookup
    }

    pub fn editor(&self) -> &TranslationEditor {
        &self.editor
    }

    /// Reconcile a freshly saved object. Call after every successful save.
    pub async fn reconcile(&self, object: &SourceObject, options: &SyncOptions) -> Result<SyncReport> {
        self.sync.reconcile(object, options).await
    }

    /// Sweep orphans, then reconcile every object matching `criteria`.
    ///
    /// The sweep always covers the whole store. `criteria` only narrow the
    /// bulk update.
    pub async fn refresh(&self, criteria: Option<&Criteria>, cancel: &CancelFlag) -> Result<RefreshReport> {
        let swept = self.collector.sweep(None, cancel).await?;
        let bulk = self.bulk.update_all(criteria, cancel).await?;
        info!(
            "Refresh finished: {} orphans removed, {} records updated",
            swept.removed, bulk.updated
        );
        Ok(RefreshReport { swept, bulk })
    }

    /// Sweep orphans, then export the catalog of `language_code`.
    pub async fn export(
        &self,
        language_code: &str,
        header: &CatalogHeader,
        cancel: &CancelFlag,
    ) -> Result<String> {
        let language = self.languages.translation_language(language_code)?;
        self.collector.sweep(None, cancel).await?;
        catalog::export(self.store.as_ref(), &language, header, self.page_size).await
    }

    /// Import a catalog into `language_code`. All or nothing.
    pub async fn import(
        &self,
        text: &str,
        language_code: &str,
        actor: Option<ActorId>,
        cancel: &CancelFlag,
    ) -> Result<ImportReport> {
        self.importer.import(text, language_code, actor, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Language;
    use crate::model::{RecordFilter, TypeRef};
    use crate::objects::MemoryObjectStore;
    use crate::schema::TypeDescriptor;
    use crate::store::MemoryStore;

    fn engine(store: &MemoryStore, objects: &MemoryObjectStore) -> Engine {
        let config = Config::from_lookup(|name| match name {
            "LANGUAGES" => Some("en,fr".to_string()),
            "PAGE_SIZE" => Some("2".to_string()),
            _ => None,
        })
        .unwrap();
        let types = Arc::new(TypeRegistry::with_types([
            TypeDescriptor::new("blog", "Article")
                .fields(["title", "status"])
                .translatable(["title"]),
            TypeDescriptor::new("blog", "Page")
                .fields(["heading"])
                .translatable(["heading"]),
        ]));
        Engine::from_config(&config, Arc::new(store.clone()), Arc::new(objects.clone()), types).unwrap()
    }

    fn article(id: i64) -> SourceObject {
        SourceObject::new(TypeRef::new("blog", "Article"), id).with("title", format!("Article {}", id))
    }

    #[tokio::test]
    async fn test_refresh_sweeps_before_updating() {
        let store = MemoryStore::new();
        let objects = MemoryObjectStore::new();
        for id in 1..=3 {
            objects.insert(article(id)).unwrap();
        }
        let engine = engine(&store, &objects);
        engine.refresh(None, &CancelFlag::new()).await.unwrap();
        assert_eq!(store.len(), 3);

        objects.remove(&TypeRef::new("blog", "Article"), 2).unwrap();
        let report = engine.refresh(None, &CancelFlag::new()).await.unwrap();

        assert_eq!(report.swept.removed, 1);
        assert_eq!(report.bulk.objects, 2);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_criteria_do_not_scope_the_sweep() {
        let store = MemoryStore::new();
        let objects = MemoryObjectStore::new();
        objects.insert(article(1).with("status", "published")).unwrap();
        objects.insert(article(2).with("status", "draft")).unwrap();
        let page = SourceObject::new(TypeRef::new("blog", "Page"), 1).with("heading", "About");
        objects.insert(page.clone()).unwrap();
        let engine = engine(&store, &objects);
        for object in [article(1), article(2), page] {
            engine.reconcile(&object, &SyncOptions::new()).await.unwrap();
        }
        assert_eq!(store.len(), 3);

        let criteria = Criteria::new().with("status", "draft");
        let report = engine.refresh(Some(&criteria), &CancelFlag::new()).await.unwrap();

        assert_eq!(report.swept.removed, 0);
        assert_eq!(report.bulk.objects, 1);
        assert_eq!(store.len(), 3, "Live objects outside the filter keep their records");
    }

    #[tokio::test]
    async fn test_empty_export_imports_back() {
        let store = MemoryStore::new();
        let objects = MemoryObjectStore::new();
        let engine = engine(&store, &objects);

        let text = engine
            .export("fr", &CatalogHeader::default(), &CancelFlag::new())
            .await
            .unwrap();
        let report = engine.import(&text, "fr", None, &CancelFlag::new()).await.unwrap();

        assert_eq!(report.imported(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_export_then_import_through_engine() {
        let store = MemoryStore::new();
        let objects = MemoryObjectStore::new();
        objects.insert(article(1)).unwrap();
        let engine = engine(&store, &objects);
        engine
            .reconcile(&article(1), &SyncOptions::new())
            .await
            .unwrap();

        let record = store.query(&RecordFilter::all()).await.unwrap().remove(0);
        engine
            .editor()
            .edit(record.id.unwrap(), "Article un", false, None)
            .await
            .unwrap();

        let text = engine
            .export("fr", &CatalogHeader::default(), &CancelFlag::new())
            .await
            .unwrap();
        assert!(text.contains("msgstr \"Article un\""));

        let edited = text.replace("Article un", "Premier article");
        engine.import(&edited, "fr", None, &CancelFlag::new()).await.unwrap();

        let value = engine
            .lookup()
            .translated_value(&article(1), "title", &Language::parse("fr").unwrap())
            .await
            .unwrap();
        assert_eq!(value.as_deref(), Some("Premier article"));
    }
}
