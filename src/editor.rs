//! Editing surface operations: listing the records of a language and editing one record.

use crate::error::{Result, TranslationError};
use crate::i18n::LanguageRegistry;
use crate::model::{ActorId, FuzzyStatus, RecordFilter, RecordId, TranslationRecord};
use crate::store::TranslationStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Context annotation of records edited by hand.
pub const ADMIN_CONTEXT: &str = "Translations admin";

/// One page of a listing plus the number of matching records.
#[derive(Debug)]
pub struct Listing {
    pub records: Vec<TranslationRecord>,
    pub total: usize,
}

/// Listing parameters. Empty search means no search.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub status: FuzzyStatus,
    pub search: String,
    pub after_id: Option<RecordId>,
    pub limit: Option<usize>,
}

pub struct TranslationEditor {
    store: Arc<dyn TranslationStore>,
    languages: Arc<LanguageRegistry>,
}

impl TranslationEditor {
    pub fn new(store: Arc<dyn TranslationStore>, languages: Arc<LanguageRegistry>) -> Self {
        Self { store, languages }
    }

    /// Records of one translation language. Listing never modifies records.
    pub async fn list(&self, language_code: &str, query: &ListQuery) -> Result<Listing> {
        let language = self.languages.translation_language(language_code)?;
        let mut filter = RecordFilter::all()
            .language(&language)
            .status(query.status)
            .search(query.search.trim());
        filter.after_id = query.after_id;
        filter.limit = query.limit;

        let total = self.store.count(&filter).await?;
        let records = self.store.query(&filter).await?;
        Ok(Listing { records, total })
    }

    /// Replace the translation and review flag of record `id`.
    pub async fn edit(
        &self,
        id: RecordId,
        translated_text: impl Into<String>,
        is_fuzzy: bool,
        actor: Option<ActorId>,
    ) -> Result<TranslationRecord> {
        let mut record = self
            .store
            .get(id)
            .await?
            .ok_or(TranslationError::NotFound {
                what: "Translation",
                id,
            })?;

        record.translated_text = Some(translated_text.into());
        record.is_fuzzy = is_fuzzy;
        record.context = Some(ADMIN_CONTEXT.to_string());
        record.enforce_fuzzy_invariant();
        record.stamp(Utc::now(), actor);

        let saved = self.store.save(record).await?;
        info!("Translation #{} edited ({})", id, saved.key);
        Ok(saved)
    }
}
