//! Error types for the translation engine.

use crate::model::RecordId;
use thiserror::Error;

/// Failures reported by a translation record store or an object store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing database rejected or failed the operation.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A write would create a second record for the same translation key.
    #[error("Duplicate translation key: {0}")]
    DuplicateKey(String),

    /// An update targeted a record id that is not stored.
    #[error("Translation record {0} does not exist")]
    MissingRecord(RecordId),

    /// A stored row could not be turned back into a record.
    #[error("Invalid stored row: {0}")]
    InvalidRow(String),

    /// The store is unreachable or refused the call.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A mutex lock was poisoned by a panic in another thread.
    #[error("Store lock was poisoned")]
    LockPoisoned,
}

/// Errors surfaced by the synchronization engine and its batch operations.
#[derive(Debug, Error)]
pub enum TranslationError {
    /// A declared translatable field does not exist on the type, or the type cannot be resolved.
    #[error("Configuration error for {type_name}.{field}: {reason}")]
    Configuration {
        type_name: String,
        field: String,
        reason: String,
    },

    /// A specific record or object id could not be found.
    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: i64 },

    /// A catalog entry could not be parsed; the entry is skipped.
    #[error("Malformed catalog entry at line {line}: {reason}")]
    MalformedCatalogEntry { line: usize, reason: String },

    /// A non-empty catalog produced no importable entry.
    #[error("Catalog contained no importable entries")]
    NothingImported,

    /// The language is unknown, disabled, or is the default language where a translation language is required.
    #[error("Invalid language '{code}': {reason}")]
    InvalidLanguage { code: String, reason: String },

    /// A translation key component contains characters the catalog format cannot carry.
    #[error("Invalid translation key: {0}")]
    InvalidKey(String),

    /// The operation was cancelled between pages.
    #[error("Operation cancelled")]
    Cancelled,

    /// The store failed; fatal for the current operation.
    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl TranslationError {
    pub(crate) fn configuration(
        type_name: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        TranslationError::Configuration {
            type_name: type_name.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_language(code: impl Into<String>, reason: impl Into<String>) -> Self {
        TranslationError::InvalidLanguage {
            code: code.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error aborts the current batch rather than a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TranslationError::Persistence(_) | TranslationError::Cancelled
        )
    }
}

pub type Result<T> = std::result::Result<T, TranslationError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
