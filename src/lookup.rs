//! Read path: the value of a field as end users should see it in a language.

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::i18n::{Language, LanguageRegistry};
use crate::model::{FuzzyStatus, RecordFilter, SourceObject, TranslationKey, TranslationRecord};
use crate::store::TranslationStore;
use std::sync::Arc;
use tracing::debug;

pub struct TranslationLookup {
    store: Arc<dyn TranslationStore>,
    languages: Arc<LanguageRegistry>,
}

impl TranslationLookup {
    pub fn new(store: Arc<dyn TranslationStore>, languages: Arc<LanguageRegistry>) -> Self {
        Self { store, languages }
    }

    /// Value of `field` of `object` in `language`.
    ///
    /// Falls back to the source value when the language is the default or not
    /// enabled, or when no presentable (non-empty, non-fuzzy) translation exists.
    pub async fn translated_value(
        &self,
        object: &SourceObject,
        field: &str,
        language: &Language,
    ) -> Result<Option<String>> {
        let source = object.get(field).map(str::to_string);
        if self.languages.is_default(language) || !self.languages.is_enabled(language.code()) {
            return Ok(source);
        }

        let key = TranslationKey::for_object(object, field, language)?;
        match self.store.find(&key).await? {
            Some(record) if record.is_presentable() => Ok(record.translated_text),
            Some(_) => {
                debug!("{} is not presentable, using source value", key);
                Ok(source)
            }
            None => Ok(source),
        }
    }

    /// Every stored record of `object` in `language`, ordered by id.
    pub async fn translations_for(
        &self,
        object: &SourceObject,
        language: &Language,
    ) -> Result<Vec<TranslationRecord>> {
        let filter = RecordFilter::all()
            .object(&object.type_ref, object.id)
            .language(language);
        Ok(self.store.query(&filter).await?)
    }

    /// Reviewed translations into `language` of any record whose source is exactly `source_text`.
    pub async fn same_source(&self, source_text: &str, language: &Language) -> Result<Vec<TranslationRecord>> {
        let filter = RecordFilter::all()
            .fingerprint(Fingerprint::of(source_text))
            .language(language)
            .status(FuzzyStatus::Completed);
        let records = self.store.query(&filter).await?;
        Ok(records
            .into_iter()
            .filter(|record| record.source_text == source_text && record.is_presentable())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeRef;
    use crate::store::MemoryStore;

    fn lang(code: &str) -> Language {
        Language::parse(code).unwrap()
    }

    fn article(id: i64, title: &str) -> SourceObject {
        SourceObject::new(TypeRef::new("blog", "Article"), id).with("title", title)
    }

    async fn seed(store: &MemoryStore, object_id: i64, source: &str, code: &str, translated: &str, fuzzy: bool) {
        let key = TranslationKey::new("blog", "Article", object_id, "title", lang(code)).unwrap();
        let mut record = TranslationRecord::new(key, source);
        record.translated_text = Some(translated.to_string());
        record.is_fuzzy = fuzzy;
        store.save(record).await.expect("Should save record");
    }

    fn lookup(store: &MemoryStore) -> TranslationLookup {
        TranslationLookup::new(
            Arc::new(store.clone()),
            Arc::new(LanguageRegistry::new(&["en", "fr", "de"], "en").unwrap()),
        )
    }

    #[tokio::test]
    async fn test_presentable_translation_is_returned() {
        let store = MemoryStore::new();
        seed(&store, 1, "Launch", "fr", "Lancement", false).await;

        let value = lookup(&store)
            .translated_value(&article(1, "Launch"), "title", &lang("fr"))
            .await
            .unwrap();
        assert_eq!(value.as_deref(), Some("Lancement"));
    }

    #[tokio::test]
    async fn test_fuzzy_or_missing_translation_falls_back_to_source() {
        let store = MemoryStore::new();
        seed(&store, 1, "Launch", "fr", "Lancement", true).await;
        let lookup = lookup(&store);

        let fuzzy = lookup
            .translated_value(&article(1, "Launch"), "title", &lang("fr"))
            .await
            .unwrap();
        assert_eq!(fuzzy.as_deref(), Some("Launch"));

        let missing = lookup
            .translated_value(&article(1, "Launch"), "title", &lang("de"))
            .await
            .unwrap();
        assert_eq!(missing.as_deref(), Some("Launch"));
    }

    #[tokio::test]
    async fn test_default_and_disabled_languages_use_source() {
        let store = MemoryStore::new();
        let lookup = lookup(&store);
        for code in ["en", "it"] {
            let value = lookup
                .translated_value(&article(1, "Launch"), "title", &lang(code))
                .await
                .unwrap();
            assert_eq!(value.as_deref(), Some("Launch"));
        }
    }

    #[tokio::test]
    async fn test_translations_for_object() {
        let store = MemoryStore::new();
        seed(&store, 1, "Launch", "fr", "Lancement", false).await;
        seed(&store, 1, "Launch", "de", "Start", false).await;
        seed(&store, 2, "Party", "fr", "Fête", false).await;

        let records = lookup(&store)
            .translations_for(&article(1, "Launch"), &lang("fr"))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].translated_text.as_deref(), Some("Lancement"));
    }

    #[tokio::test]
    async fn test_same_source_returns_reviewed_translations() {
        let store = MemoryStore::new();
        seed(&store, 1, "Read more", "fr", "Lire la suite", false).await;
        seed(&store, 2, "Read more", "fr", "En savoir plus", true).await;
        seed(&store, 3, "Read less", "fr", "Lire moins", false).await;

        let matches = lookup(&store)
            .same_source("Read more", &lang("fr"))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].key.object_id, 1);
    }
}
