//! Inline translation values supplied alongside a source object save.
//!
//! Editing surfaces submit translated values and review flags together with
//! the object itself. They reach the synchronizer as a typed map keyed by
//! `(field, language)`; [`LanguageOverrides::from_form`] decodes the flat
//! `<field>_<lang>` / `<field>_<lang>_is_fuzzy` payload convention.

use crate::i18n::Language;
use std::collections::{BTreeMap, HashMap};

/// Values supplied for one field in one language. Unset parts leave the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldOverride {
    pub translated_text: Option<String>,
    pub is_fuzzy: Option<bool>,
}

/// Inline values keyed by `(field, language)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageOverrides {
    entries: BTreeMap<(String, Language), FieldOverride>,
}

impl LanguageOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, field: &str, language: &Language) -> &mut FieldOverride {
        self.entries
            .entry((field.to_string(), language.clone()))
            .or_default()
    }

    /// Supply a translated value.
    pub fn with_text(mut self, field: &str, language: &Language, text: impl Into<String>) -> Self {
        self.entry(field, language).translated_text = Some(text.into());
        self
    }

    /// Supply a review flag.
    pub fn with_fuzzy(mut self, field: &str, language: &Language, is_fuzzy: bool) -> Self {
        self.entry(field, language).is_fuzzy = Some(is_fuzzy);
        self
    }

    pub fn get(&self, field: &str, language: &Language) -> Option<&FieldOverride> {
        self.entries.get(&(field.to_string(), language.clone()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Decode a flat form payload.
    ///
    /// For every translatable `field` and every language `lang`, the payload
    /// may carry `<field>_<lang>` (translated value) and
    /// `<field>_<lang>_is_fuzzy` (`"1"`, `"true"` or `"on"` mean fuzzy). The
    /// language part is lower-cased with `-` replaced by `_`. Other keys are
    /// ignored.
    pub fn from_form<'a, F, L>(form: &HashMap<String, String>, fields: F, languages: L) -> Self
    where
        F: IntoIterator<Item = &'a String>,
        L: IntoIterator<Item = &'a Language> + Clone,
    {
        let mut overrides = Self::new();

        for field in fields {
            for language in languages.clone() {
                let text_key = format!("{}_{}", field, language.attr_suffix());
                if let Some(text) = form.get(&text_key) {
                    overrides.entry(field, language).translated_text = Some(text.clone());
                }

                let fuzzy_key = format!("{}_is_fuzzy", text_key);
                if let Some(flag) = form.get(&fuzzy_key) {
                    let is_fuzzy = matches!(flag.trim(), "1" | "true" | "on");
                    overrides.entry(field, language).is_fuzzy = Some(is_fuzzy);
                }
            }
        }

        overrides
    }
}
