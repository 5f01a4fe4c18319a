//! Versioned URL detection
//!
//! URLs matching `dontCacheBustUrlsMatching` are assumed to carry their
//! version in the URL itself and get no revision in the manifest.

use regex_lite::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::RulesError;

/// Matches an 8-character hash segment between dots, e.g. `app.3f9a8b2c.js`
pub const DEFAULT_VERSIONED_URL_PATTERN: &str = r"\.\w{8}\.";

/// A compiled URL pattern that serializes as its source string
#[derive(Clone)]
pub struct UrlPattern {
    source: String,
    regex: Regex,
}

impl UrlPattern {
    pub fn new(source: &str) -> Result<Self, RulesError> {
        let regex = Regex::new(source).map_err(|e| RulesError::InvalidRegex {
            pattern: source.to_string(),
            source: e,
        })?;

        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// The hashed-filename pattern used by default
    pub fn versioned_default() -> Self {
        Self {
            source: DEFAULT_VERSIONED_URL_PATTERN.to_string(),
            regex: Regex::new(DEFAULT_VERSIONED_URL_PATTERN)
                .expect("default URL pattern is valid"),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }
}

impl PartialEq for UrlPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for UrlPattern {}

impl fmt::Debug for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UrlPattern").field(&self.source).finish()
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.source)
    }
}

impl Serialize for UrlPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for UrlPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        UrlPattern::new(&source).map_err(serde::de::Error::custom)
    }
}
