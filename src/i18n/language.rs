//! Language type: validated ISO language code.

use crate::error::{Result, TranslationError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A syntactically valid language code (e.g. "en", "fr", "pt-BR").
///
/// Whether the language is enabled, and whether it is the default language,
/// is decided by the [`LanguageRegistry`](crate::i18n::LanguageRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Language {
    code: String,
}

impl Language {
    /// Parse a language code.
    ///
    /// Accepts a 2-3 letter primary tag optionally followed by `-` or `_`
    /// separated alphanumeric subtags.
    ///
    /// # Example
    /// ```
    /// use fieldtrans::i18n::Language;
    /// let french = Language::parse("fr").unwrap();
    /// assert_eq!(french.code(), "fr");
    /// ```
    pub fn parse(code: &str) -> Result<Language> {
        let code = code.trim();
        let mut parts = code.split(['-', '_']);

        let primary = parts.next().unwrap_or_default();
        if !(2..=3).contains(&primary.len()) || !primary.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(TranslationError::invalid_language(
                code,
                "expected a 2 or 3 letter language code",
            ));
        }

        for subtag in parts {
            if subtag.is_empty()
                || subtag.len() > 8
                || !subtag.chars().all(|c| c.is_ascii_alphanumeric())
            {
                return Err(TranslationError::invalid_language(
                    code,
                    "invalid language subtag",
                ));
            }
        }

        Ok(Language {
            code: code.to_string(),
        })
    }

    /// Get the language code as written.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Code form used as an attribute suffix: lower-cased, `-` replaced with `_`.
    ///
    /// `pt-BR` becomes `pt_br`.
    pub fn attr_suffix(&self) -> String {
        self.code.replace('-', "_").to_lowercase()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

impl TryFrom<String> for Language {
    type Error = TranslationError;

    fn try_from(value: String) -> Result<Self> {
        Language::parse(&value)
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.code
    }
}
