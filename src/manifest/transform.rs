//! Manifest transformations
//!
//! Built-in transforms run first, in order: URL prefix rewriting, then
//! removal of revisions for already versioned URLs. Custom transforms
//! supplied to the builder run after them.

use std::collections::BTreeMap;

use super::{ManifestEntry, ManifestError};
use crate::rules::UrlPattern;

/// A transformation applied to the whole list of manifest entries
pub trait ManifestTransform {
    /// Name used in errors and logs
    fn name(&self) -> &str;

    fn transform(&self, entries: Vec<ManifestEntry>) -> Result<Vec<ManifestEntry>, ManifestError>;
}

/// Replaces a leading URL prefix (`modifyUrlPrefix`)
#[derive(Debug, Clone)]
pub struct ModifyUrlPrefix {
    /// Longest prefix first, so the most specific rewrite wins
    prefixes: Vec<(String, String)>,
}

impl ModifyUrlPrefix {
    pub fn new(map: &BTreeMap<String, String>) -> Self {
        let mut prefixes: Vec<(String, String)> = map
            .iter()
            .map(|(from, to)| (from.clone(), to.clone()))
            .collect();
        prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { prefixes }
    }

    pub fn rewrite(&self, url: &str) -> String {
        for (from, to) in &self.prefixes {
            if let Some(rest) = url.strip_prefix(from.as_str()) {
                return format!("{}{}", to, rest);
            }
        }
        url.to_string()
    }
}

impl ManifestTransform for ModifyUrlPrefix {
    fn name(&self) -> &str {
        "modifyUrlPrefix"
    }

    fn transform(&self, entries: Vec<ManifestEntry>) -> Result<Vec<ManifestEntry>, ManifestError> {
        Ok(entries
            .into_iter()
            .map(|mut entry| {
                entry.url = self.rewrite(&entry.url);
                entry
            })
            .collect())
    }
}

/// Drops the revision of URLs matching `dontCacheBustUrlsMatching`
#[derive(Debug, Clone)]
pub struct CacheBustExemption {
    pattern: UrlPattern,
}

impl CacheBustExemption {
    pub fn new(pattern: UrlPattern) -> Self {
        Self { pattern }
    }
}

impl ManifestTransform for CacheBustExemption {
    fn name(&self) -> &str {
        "dontCacheBustUrlsMatching"
    }

    fn transform(&self, entries: Vec<ManifestEntry>) -> Result<Vec<ManifestEntry>, ManifestError> {
        Ok(entries
            .into_iter()
            .map(|mut entry| {
                if self.pattern.is_match(&entry.url) {
                    entry.revision = None;
                }
                entry
            })
            .collect())
    }
}
