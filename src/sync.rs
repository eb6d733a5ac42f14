//! Synchronizer: keeps translation records in step with the source objects they translate.
//!
//! Hosts call [`Synchronizer::reconcile`] from their save path, once per
//! persisted object. For every translatable field and every translation
//! language the synchronizer creates the missing record, refreshes the source
//! text and fingerprint, applies inline values supplied with the save, and
//! enforces that an empty translation is always fuzzy.
//!
//! Reconciling one object is a read-modify-write sequence without locking:
//! callers must not reconcile the same object concurrently. Different objects
//! are independent.

use crate::error::{Result, TranslationError};
use crate::i18n::{Language, LanguageRegistry};
use crate::model::{ActorId, SourceObject, TranslationKey, TranslationRecord};
use crate::overrides::LanguageOverrides;
use crate::schema::{TypeDescriptor, TypeRegistry};
use crate::store::TranslationStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Context annotation recorded when a translation changes through an object save.
pub const DEFAULT_CONTEXT: &str = "Updated from object";

/// Per-call inputs of a reconciliation.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Inline values supplied with the save.
    pub overrides: LanguageOverrides,
    /// Annotation stored when a translation changes. Defaults to the synchronizer's.
    pub context: Option<String>,
    /// Actor stamped as the last editor of every written record.
    pub actor: Option<ActorId>,
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn overrides(mut self, overrides: LanguageOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn actor(mut self, actor: Option<ActorId>) -> Self {
        self.actor = actor;
        self
    }
}

/// Outcome of one reconciliation.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Records written, in the order they were saved.
    pub written: Vec<TranslationRecord>,
    /// Skipped `(field, language)` pairs and why.
    pub errors: Vec<TranslationError>,
}

impl SyncReport {
    pub fn count(&self) -> usize {
        self.written.len()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct Synchronizer {
    store: Arc<dyn TranslationStore>,
    types: Arc<TypeRegistry>,
    languages: Arc<LanguageRegistry>,
    default_context: String,
}

impl Synchronizer {
    pub fn new(
        store: Arc<dyn TranslationStore>,
        types: Arc<TypeRegistry>,
        languages: Arc<LanguageRegistry>,
    ) -> Self {
        Self {
            store,
            types,
            languages,
            default_context: DEFAULT_CONTEXT.to_string(),
        }
    }

    /// Replace the annotation used when a call supplies none.
    pub fn with_default_context(mut self, context: impl Into<String>) -> Self {
        self.default_context = context.into();
        self
    }

    pub fn languages(&self) -> &LanguageRegistry {
        &self.languages
    }

    fn descriptor(&self, object: &SourceObject) -> Result<TypeDescriptor> {
        self.types.resolve_ref(&object.type_ref).ok_or_else(|| {
            TranslationError::configuration(
                object.type_ref.to_string(),
                "*",
                "type is not registered",
            )
        })
    }

    /// Reconcile every translatable field of `object` in every translation language.
    ///
    /// Configuration problems of single pairs are collected in the report;
    /// a store failure aborts the call.
    pub async fn reconcile(&self, object: &SourceObject, options: &SyncOptions) -> Result<SyncReport> {
        let descriptor = self.descriptor(object)?;
        let pairs: Vec<(String, Language)> = descriptor
            .translatable_fields
            .iter()
            .flat_map(|field| {
                self.languages
                    .translation_targets()
                    .map(move |language| (field.clone(), language.clone()))
            })
            .collect();

        self.reconcile_with(&descriptor, object, &pairs, options).await
    }

    /// Reconcile an explicit set of `(field, language)` pairs of `object`.
    pub async fn reconcile_pairs(
        &self,
        object: &SourceObject,
        pairs: &[(String, Language)],
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        let descriptor = self.descriptor(object)?;
        self.reconcile_with(&descriptor, object, pairs, options).await
    }

    /// Reconcile a single field in a single language.
    ///
    /// Returns the written record, or `None` when the pair is skipped (default
    /// language, or the object holds no value for the field).
    pub async fn reconcile_field(
        &self,
        object: &SourceObject,
        field: &str,
        language: &Language,
        options: &SyncOptions,
    ) -> Result<Option<TranslationRecord>> {
        let descriptor = self.descriptor(object)?;
        self.sync_pair(&descriptor, object, field, language, options, Utc::now())
            .await
    }

    async fn reconcile_with(
        &self,
        descriptor: &TypeDescriptor,
        object: &SourceObject,
        pairs: &[(String, Language)],
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        let now = Utc::now();
        let mut report = SyncReport::default();

        for (field, language) in pairs {
            match self
                .sync_pair(descriptor, object, field, language, options, now)
                .await
            {
                Ok(Some(record)) => report.written.push(record),
                Ok(None) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        "Skipping {} #{} field '{}' ({}): {}",
                        object.type_ref, object.id, field, language, e
                    );
                    report.errors.push(e);
                }
            }
        }

        debug!(
            "Reconciled {} #{}: {} records written, {} skipped",
            object.type_ref,
            object.id,
            report.written.len(),
            report.errors.len()
        );
        Ok(report)
    }

    async fn sync_pair(
        &self,
        descriptor: &TypeDescriptor,
        object: &SourceObject,
        field: &str,
        language: &Language,
        options: &SyncOptions,
        now: DateTime<Utc>,
    ) -> Result<Option<TranslationRecord>> {
        if self.languages.is_default(language) {
            return Ok(None);
        }
        if !self.languages.is_enabled(language.code()) {
            return Err(TranslationError::invalid_language(
                language.code(),
                "language is not enabled",
            ));
        }
        if !descriptor.has_field(field) {
            return Err(TranslationError::configuration(
                &descriptor.type_ref.type_name,
                field,
                "field is not declared on the type",
            ));
        }
        if !descriptor.is_translatable(field) {
            return Err(TranslationError::configuration(
                &descriptor.type_ref.type_name,
                field,
                "field is not declared translatable",
            ));
        }

        let Some(source_text) = object.get(field) else {
            debug!(
                "{} #{} has no value for '{}', nothing to translate",
                object.type_ref, object.id, field
            );
            return Ok(None);
        };

        let key = TranslationKey::for_object(object, field, language)?;
        let inline = options.overrides.get(field, language);
        let context = options
            .context
            .clone()
            .unwrap_or_else(|| self.default_context.clone());

        let mut record = match self.store.find(&key).await? {
            Some(existing) => existing,
            None => {
                let mut created = TranslationRecord::new(key, source_text);
                if let Some(text) = inline
                    .and_then(|o| o.translated_text.as_ref())
                    .filter(|text| !text.is_empty())
                {
                    created.translated_text = Some(text.clone());
                }
                created.is_fuzzy = inline.and_then(|o| o.is_fuzzy).unwrap_or(true);
                created.context = Some(context.clone());
                debug!("Creating translation {}", created.key);
                created
            }
        };

        record.set_source_text(source_text);

        if let Some(inline) = inline {
            if let Some(text) = &inline.translated_text {
                if record.translated_text.as_deref() != Some(text.as_str()) {
                    record.translated_text = Some(text.clone());
                    record.context = Some(context);
                }
            }
            if let Some(is_fuzzy) = inline.is_fuzzy {
                record.is_fuzzy = is_fuzzy;
            }
        }

        record.enforce_fuzzy_invariant();
        record.stamp(now, options.actor);

        let saved = self.store.save(record).await?;
        Ok(Some(saved))
    }
}
