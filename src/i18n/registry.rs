//! Language registry: the enabled languages and the designated default language.
//!
//! The registry is built once from configuration and passed to the components
//! that need it. It is immutable after construction.

use crate::error::{Result, TranslationError};
use crate::i18n::Language;

/// The set of enabled languages of a deployment.
///
/// Exactly one language is the default language: its text lives directly on
/// the source objects and is never stored as a translation record.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: Vec<Language>,
    default: Language,
}

impl LanguageRegistry {
    /// Build a registry from the enabled language codes and the default code.
    ///
    /// # Returns
    /// * `Ok(LanguageRegistry)` if every code parses and the default is enabled
    /// * `Err` if a code is invalid, the list is empty, or the default is missing
    pub fn new<S: AsRef<str>>(codes: &[S], default_code: &str) -> Result<Self> {
        let mut languages: Vec<Language> = Vec::with_capacity(codes.len());
        for code in codes {
            let language = Language::parse(code.as_ref())?;
            if !languages.contains(&language) {
                languages.push(language);
            }
        }

        let default = Language::parse(default_code)?;
        if !languages.contains(&default) {
            return Err(TranslationError::invalid_language(
                default_code,
                "default language is not among the enabled languages",
            ));
        }

        Ok(Self { languages, default })
    }

    /// Get an enabled language by its code.
    ///
    /// # Returns
    /// * `Some(&Language)` if the language is enabled
    /// * `None` otherwise
    pub fn get_by_code(&self, code: &str) -> Option<&Language> {
        self.languages.iter().find(|lang| lang.code() == code.trim())
    }

    /// Get all enabled languages, default included.
    pub fn list_enabled(&self) -> &[Language] {
        &self.languages
    }

    /// Get the default language.
    pub fn default_language(&self) -> &Language {
        &self.default
    }

    /// Check if a language is the default language.
    pub fn is_default(&self, language: &Language) -> bool {
        *language == self.default
    }

    /// Check if a language code is enabled.
    pub fn is_enabled(&self, code: &str) -> bool {
        self.get_by_code(code).is_some()
    }

    /// Languages that receive translation records (every enabled language except the default).
    pub fn translation_targets(&self) -> impl Iterator<Item = &Language> + '_ {
        self.languages.iter().filter(move |lang| **lang != self.default)
    }

    /// Resolve a code into an enabled, non-default language.
    ///
    /// This is the validation every operation addressing a single translation
    /// language (listing, export, import) performs.
    pub fn translation_language(&self, code: &str) -> Result<Language> {
        let language = self
            .get_by_code(code)
            .ok_or_else(|| TranslationError::invalid_language(code, "language is not enabled"))?;

        if self.is_default(language) {
            return Err(TranslationError::invalid_language(
                code,
                "the default language has no translation records",
            ));
        }

        Ok(language.clone())
    }
}
