//! Per-field translation synchronization for domain objects.
//!
//! Translatable text fields of host objects get one [`model::TranslationRecord`]
//! per non-default language. The [`sync::Synchronizer`] keeps records in step
//! with the source text, the [`orphans::OrphanCollector`] and
//! [`bulk::BulkUpdater`] maintain the whole population, and the
//! [`catalog`] module moves translations in and out as gettext-style files.

pub mod bulk;
pub mod cancel;
pub mod catalog;
pub mod config;
pub mod db;
pub mod editor;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod i18n;
pub mod lookup;
pub mod model;
pub mod objects;
pub mod orphans;
pub mod overrides;
pub mod schema;
pub mod store;
pub mod sync;

pub use engine::{Engine, EngineSettings};
pub use error::{Result, StoreError, TranslationError};
