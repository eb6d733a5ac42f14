//! Language handling.
//!
//! - `language`: validated language code type
//! - `registry`: enabled languages and the designated default language
//!
//! # Example
//!
//! ```rust
//! use fieldtrans::i18n::LanguageRegistry;
//!
//! let registry = LanguageRegistry::new(&["en", "es", "fr"], "en").unwrap();
//! let targets: Vec<_> = registry.translation_targets().map(|l| l.code()).collect();
//! assert_eq!(targets, vec!["es", "fr"]);
//! ```

mod language;
mod registry;

pub use language::Language;
pub use registry::LanguageRegistry;
