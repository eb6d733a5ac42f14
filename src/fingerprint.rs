//! Content fingerprints used to detect changes in source text.
//!
//! The digest is MD5 over the UTF-8 bytes of the text, rendered as 32 lower-case
//! hex characters. It is only used for change detection, never for security.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex-encoded MD5 digest of a source string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of `text`.
    pub fn of(text: &str) -> Self {
        let digest = md5::compute(text.as_bytes());
        Fingerprint(format!("{:x}", digest))
    }

    /// Wrap a digest previously produced by [`Fingerprint::of`] (e.g. read back from storage).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Fingerprint(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this fingerprint was computed from `text`.
    pub fn matches(&self, text: &str) -> bool {
        *self == Fingerprint::of(text)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            Fingerprint::of("").as_str(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            Fingerprint::of("hello").as_str(),
            "5d41402abc4b2a76b9719d911017c592"
        );
    }

    #[test]
    fn test_different_text_different_fingerprint() {
        assert_ne!(Fingerprint::of("Launch"), Fingerprint::of("Launch Day"));
    }

    #[test]
    fn test_unicode_is_hashed_as_utf8() {
        let fp = Fingerprint::of("Lanzamiento ñ 日本");
        assert_eq!(fp.as_str().len(), 32);
        assert!(fp.matches("Lanzamiento ñ 日本"));
        assert!(!fp.matches("Lanzamiento n 日本"));
    }

    #[test]
    fn test_from_hex_roundtrip() {
        let fp = Fingerprint::of("Launch");
        let restored = Fingerprint::from_hex(fp.to_string());
        assert_eq!(fp, restored);
    }

    proptest! {
        #[test]
        fn prop_fingerprint_is_deterministic(s in ".*") {
            prop_assert_eq!(Fingerprint::of(&s), Fingerprint::of(&s.clone()));
        }

        #[test]
        fn prop_fingerprint_is_lowercase_hex(s in ".*") {
            let fp = Fingerprint::of(&s);
            prop_assert_eq!(fp.as_str().len(), 32);
            prop_assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }
}
