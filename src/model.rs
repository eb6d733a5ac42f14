//! Core data model: translation keys, translation records, source objects and filters.

use crate::error::{Result, TranslationError};
use crate::fingerprint::Fingerprint;
use crate::i18n::Language;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Primary key of a stored translation record.
pub type RecordId = i64;

/// Identity of a source object within its type.
pub type ObjectId = i64;

/// Reference to the actor (user) that last edited a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub i64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Namespace-qualified name of a source entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeRef {
    pub namespace: String,
    pub type_name: String,
}

impl TypeRef {
    pub fn new(namespace: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            type_name: type_name.into(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.namespace, self.type_name)
    }
}

fn is_namespace(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':'))
}

fn is_identifier(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Composite identity of a translation record.
///
/// At most one record exists per key. Every component is restricted to the
/// characters the catalog context line can carry, so a key always survives an
/// export/import round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TranslationKey {
    pub namespace: String,
    pub type_name: String,
    pub object_id: ObjectId,
    pub field: String,
    pub language: Language,
}

impl TranslationKey {
    pub fn new(
        namespace: impl Into<String>,
        type_name: impl Into<String>,
        object_id: ObjectId,
        field: impl Into<String>,
        language: Language,
    ) -> Result<Self> {
        let key = Self {
            namespace: namespace.into(),
            type_name: type_name.into(),
            object_id,
            field: field.into(),
            language,
        };
        key.validate()?;
        Ok(key)
    }

    /// Key of `field` of `object` in `language`.
    pub fn for_object(object: &SourceObject, field: &str, language: &Language) -> Result<Self> {
        Self::new(
            object.type_ref.namespace.clone(),
            object.type_ref.type_name.clone(),
            object.id,
            field,
            language.clone(),
        )
    }

    fn validate(&self) -> Result<()> {
        if !is_namespace(&self.namespace) {
            return Err(TranslationError::InvalidKey(format!(
                "namespace '{}' must be non-empty and contain only [A-Za-z0-9_.:]",
                self.namespace
            )));
        }
        if !is_identifier(&self.type_name) {
            return Err(TranslationError::InvalidKey(format!(
                "type name '{}' must be a non-empty identifier",
                self.type_name
            )));
        }
        if !is_identifier(&self.field) {
            return Err(TranslationError::InvalidKey(format!(
                "field name '{}' must be a non-empty identifier",
                self.field
            )));
        }
        if self.object_id <= 0 {
            return Err(TranslationError::InvalidKey(format!(
                "object id {} must be positive",
                self.object_id
            )));
        }
        Ok(())
    }

    pub fn type_ref(&self) -> TypeRef {
        TypeRef::new(self.namespace.clone(), self.type_name.clone())
    }
}

impl fmt::Display for TranslationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}--{}--{}--{}[{}]",
            self.namespace, self.type_name, self.object_id, self.field, self.language
        )
    }
}

/// Persisted translation of one field of one object into one language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRecord {
    /// Assigned by the store on first save.
    pub id: Option<RecordId>,
    pub key: TranslationKey,
    pub source_text: String,
    pub source_fingerprint: Fingerprint,
    pub translated_text: Option<String>,
    /// True means "do not surface to end users".
    pub is_fuzzy: bool,
    /// Annotation describing the last change.
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_editor: Option<ActorId>,
}

impl TranslationRecord {
    /// A fresh, unsaved record with an empty, fuzzy translation.
    pub fn new(key: TranslationKey, source_text: impl Into<String>) -> Self {
        let source_text = source_text.into();
        let now = Utc::now();
        Self {
            id: None,
            key,
            source_fingerprint: Fingerprint::of(&source_text),
            source_text,
            translated_text: Some(String::new()),
            is_fuzzy: true,
            context: None,
            created_at: now,
            updated_at: now,
            last_editor: None,
        }
    }

    /// Replace the source text, recomputing the fingerprint in the same step.
    pub fn set_source_text(&mut self, text: impl Into<String>) {
        self.source_text = text.into();
        self.source_fingerprint = Fingerprint::of(&self.source_text);
    }

    /// Whether a non-empty translation is present.
    pub fn has_translation(&self) -> bool {
        self.translated_text
            .as_deref()
            .is_some_and(|text| !text.is_empty())
    }

    /// An empty or missing translation is never presentable: force the fuzzy flag.
    pub fn enforce_fuzzy_invariant(&mut self) {
        if !self.has_translation() {
            self.is_fuzzy = true;
        }
    }

    /// Whether the translation may be shown to end users.
    pub fn is_presentable(&self) -> bool {
        !self.is_fuzzy && self.has_translation()
    }

    /// Stamp timestamps and editor before a write.
    ///
    /// `created_at` is only set while the record has never been stored.
    pub fn stamp(&mut self, now: DateTime<Utc>, editor: Option<ActorId>) {
        if self.id.is_none() {
            self.created_at = now;
        }
        self.updated_at = now.max(self.created_at);
        self.last_editor = editor;
    }

    /// Whether the stored fingerprint is out of date with the given source value.
    pub fn is_stale(&self, current_source: &str) -> bool {
        !self.source_fingerprint.matches(current_source)
    }
}

impl fmt::Display for TranslationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fuzzy = if self.is_fuzzy { "*" } else { "" };
        write!(
            f,
            "{}-'{}'-'{}'{}",
            self.key,
            self.source_text,
            self.translated_text.as_deref().unwrap_or_default(),
            fuzzy
        )
    }
}

/// Snapshot of a live domain object as seen by the engine.
///
/// Text attributes map to `None` when the attribute exists but holds no value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceObject {
    pub type_ref: TypeRef,
    pub id: ObjectId,
    pub values: BTreeMap<String, Option<String>>,
}

impl SourceObject {
    pub fn new(type_ref: TypeRef, id: ObjectId) -> Self {
        Self {
            type_ref,
            id,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(field.into(), Some(value.into()));
        self
    }

    /// Builder-style setter for an attribute holding no value.
    pub fn with_null(mut self, field: impl Into<String>) -> Self {
        self.values.insert(field.into(), None);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.values.insert(field.into(), Some(value.into()));
    }

    /// Current value of `field`, or `None` when absent or empty-valued.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(|value| value.as_deref())
    }
}

/// Equality-conjunction criteria over object attributes.
///
/// The pseudo-attribute `id` matches the object id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Criteria(BTreeMap<String, String>);

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Copy of these criteria narrowed to a single object id.
    pub fn with_id(&self, id: ObjectId) -> Self {
        self.clone().with("id", id.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn matches(&self, object: &SourceObject) -> bool {
        self.0.iter().all(|(field, expected)| {
            if field == "id" {
                object.id.to_string() == *expected
            } else {
                object.get(field) == Some(expected.as_str())
            }
        })
    }
}

/// Review status filter used by listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuzzyStatus {
    #[default]
    All,
    /// Only records needing review.
    Fuzzy,
    /// Only reviewed records.
    Completed,
}

impl FuzzyStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "" | "all" => Some(FuzzyStatus::All),
            "fuzzy" => Some(FuzzyStatus::Fuzzy),
            "completed" => Some(FuzzyStatus::Completed),
            _ => None,
        }
    }

    pub fn accepts(&self, is_fuzzy: bool) -> bool {
        match self {
            FuzzyStatus::All => true,
            FuzzyStatus::Fuzzy => is_fuzzy,
            FuzzyStatus::Completed => !is_fuzzy,
        }
    }
}

/// Query over stored translation records. Unset fields do not constrain.
///
/// Results are always ordered by ascending record id; `after_id` and `limit`
/// implement keyset paging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub language: Option<Language>,
    pub status: FuzzyStatus,
    /// Case-insensitive substring of the source text.
    pub search: Option<String>,
    pub namespace: Option<String>,
    pub type_name: Option<String>,
    pub object_id: Option<ObjectId>,
    pub field: Option<String>,
    pub fingerprint: Option<Fingerprint>,
    pub after_id: Option<RecordId>,
    pub limit: Option<usize>,
}

impl RecordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn language(mut self, language: &Language) -> Self {
        self.language = Some(language.clone());
        self
    }

    pub fn status(mut self, status: FuzzyStatus) -> Self {
        self.status = status;
        self
    }

    pub fn search(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.search = (!query.is_empty()).then_some(query);
        self
    }

    pub fn object(mut self, type_ref: &TypeRef, object_id: ObjectId) -> Self {
        self.namespace = Some(type_ref.namespace.clone());
        self.type_name = Some(type_ref.type_name.clone());
        self.object_id = Some(object_id);
        self
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    /// Restrict to one page following `after_id`.
    pub fn page(mut self, after_id: Option<RecordId>, limit: usize) -> Self {
        self.after_id = after_id;
        self.limit = Some(limit);
        self
    }

    /// Whether a record satisfies every constraint except paging.
    pub fn matches(&self, record: &TranslationRecord) -> bool {
        let key = &record.key;
        self.language.as_ref().map_or(true, |l| *l == key.language)
            && self.status.accepts(record.is_fuzzy)
            && self.search.as_ref().map_or(true, |q| {
                record
                    .source_text
                    .to_lowercase()
                    .contains(&q.to_lowercase())
            })
            && self.namespace.as_ref().map_or(true, |n| *n == key.namespace)
            && self.type_name.as_ref().map_or(true, |t| *t == key.type_name)
            && self.object_id.map_or(true, |id| id == key.object_id)
            && self.field.as_ref().map_or(true, |f| *f == key.field)
            && self
                .fingerprint
                .as_ref()
                .map_or(true, |fp| *fp == record.source_fingerprint)
            && match (self.after_id, record.id) {
                (Some(after), Some(id)) => id > after,
                _ => true,
            }
    }
}
