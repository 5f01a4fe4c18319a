//! The service worker build configuration record
//!
//! Field names on the wire are camelCase so a serialized record can be
//! handed to the service worker build plugin as-is.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::defaults::{normalize_path, DEFAULT_MAXIMUM_FILE_SIZE};
use crate::rules::{GlobRules, RulesError, UrlPattern};

/// What a templated URL's revision is derived from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplatedDependency {
    /// Glob patterns, relative to `globDirectory`, whose file contents
    /// determine the revision
    Globs(Vec<String>),
    /// A literal value whose hash is the revision
    Content(String),
}

/// Service worker build configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SwBuildConfig {
    /// Source service worker containing a `precache([])` placeholder
    pub sw_src: PathBuf,

    /// Where the generated service worker is written
    pub sw_dest: PathBuf,

    /// Base directory that `glob_patterns` are matched against
    pub glob_directory: PathBuf,

    /// Files matching any of these are included in the manifest
    pub glob_patterns: Vec<String>,

    /// Files matching any of these are excluded, overriding `glob_patterns`
    #[serde(default)]
    pub glob_ignores: Vec<String>,

    /// URLs assumed to be uniquely versioned already
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dont_cache_bust_urls_matching: Option<UrlPattern>,

    /// Files larger than this are left out of the manifest
    #[serde(default = "default_maximum_file_size")]
    pub maximum_file_size_to_cache_in_bytes: u64,

    /// Server-rendered URLs keyed by URL
    #[serde(default)]
    pub templated_urls: BTreeMap<String, TemplatedDependency>,

    /// URL prefix replacements applied to manifest entries
    #[serde(default)]
    pub modify_url_prefix: BTreeMap<String, String>,
}

fn default_maximum_file_size() -> u64 {
    DEFAULT_MAXIMUM_FILE_SIZE
}

impl SwBuildConfig {
    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load from TOML
    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Resolve relative paths against `root`
    pub fn resolved_against(mut self, root: &Path) -> Self {
        self.sw_src = normalize_path(&root.join(&self.sw_src));
        self.sw_dest = normalize_path(&root.join(&self.sw_dest));
        self.glob_directory = normalize_path(&root.join(&self.glob_directory));
        self
    }

    /// `sw_dest` relative to `glob_directory`, if it lies inside it
    pub fn sw_dest_in_glob_directory(&self) -> Option<PathBuf> {
        normalize_path(&self.sw_dest)
            .strip_prefix(normalize_path(&self.glob_directory))
            .ok()
            .filter(|rel| !rel.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }

    /// Compile the include/ignore rules.
    ///
    /// The generated service worker is ignored when it lives inside the
    /// glob directory, so a rebuild never precaches its own output.
    pub fn glob_rules(&self) -> Result<GlobRules, RulesError> {
        let rules = GlobRules::new(&self.glob_patterns, &self.glob_ignores)?;

        match self.sw_dest_in_glob_directory() {
            Some(rel) => rules.with_ignored_paths(&[crate::rules::to_slash_path(&rel)]),
            None => Ok(rules),
        }
    }

    /// Whether a URL is exempt from cache-busting
    pub fn is_versioned_url(&self, url: &str) -> bool {
        self.dont_cache_bust_urls_matching
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(url))
    }
}
