//! Path and URL matching rules
//!
//! `GlobRules` decides which files under the glob directory enter the
//! precache manifest. `UrlPattern` decides which URLs are already
//! versioned and so exempt from cache-busting.

mod cache_bust;
mod glob;

pub use cache_bust::{UrlPattern, DEFAULT_VERSIONED_URL_PATTERN};
pub use glob::{compile_globs, to_slash_path, GlobMatch, GlobRules, PatternSet};

/// Errors for rule compilation
#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    #[error("Invalid glob pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Invalid URL pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex_lite::Error,
    },
}
