//! Precache manifest generation
//!
//! Walks `globDirectory` in sorted order, keeps the files the glob rules
//! include, hashes them into revisions, adds templated URLs and runs the
//! manifest transforms. The result is deterministic for a given tree.

mod entry;
mod templated;
mod transform;

pub use entry::{ManifestEntry, PrecacheManifest};
pub use templated::templated_revision;
pub use transform::{CacheBustExemption, ManifestTransform, ModifyUrlPrefix};

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{SwBuildConfig, TemplatedDependency};
use crate::rules::{to_slash_path, GlobMatch, PatternSet, RulesError};

/// Errors for manifest generation
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("IO error on {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Walk error: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error(transparent)]
    Rules(#[from] RulesError),

    #[error("globDirectory does not exist: {0}")]
    GlobDirectoryMissing(PathBuf),

    #[error("templatedUrls['{url}'] matched no files for: {patterns}")]
    TemplatedUrlNoMatch { url: String, patterns: String },

    #[error("Transform '{name}' failed: {message}")]
    TransformFailed { name: String, message: String },
}

/// A file under the glob directory, hashed
#[derive(Debug, Clone)]
pub struct AssetFile {
    /// Path relative to the glob directory, `/`-separated
    pub url: String,
    /// Absolute path on disk
    pub path: PathBuf,
    pub size: u64,
    /// Hex SHA-256 of the contents
    pub revision: String,
}

/// Summary of a manifest build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Number of manifest entries
    pub count: usize,
    /// Total size of precached files in bytes
    pub size: u64,
    /// Non-fatal problems, e.g. skipped oversized files
    pub warnings: Vec<String>,
}

/// Result of building a manifest
#[derive(Debug, Clone)]
pub struct ManifestResult {
    pub manifest: PrecacheManifest,
    pub report: BuildReport,
}

/// Builds a precache manifest from a configuration record
pub struct ManifestBuilder<'a> {
    config: &'a SwBuildConfig,
    transforms: Vec<Box<dyn ManifestTransform + 'a>>,
}

impl<'a> ManifestBuilder<'a> {
    pub fn new(config: &'a SwBuildConfig) -> Self {
        Self {
            config,
            transforms: Vec::new(),
        }
    }

    /// Append a custom transform, run after the built-in ones
    pub fn with_transform(mut self, transform: impl ManifestTransform + 'a) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    /// Build the manifest
    pub fn build(&self) -> Result<ManifestResult, ManifestError> {
        let root = &self.config.glob_directory;
        if !root.is_dir() {
            return Err(ManifestError::GlobDirectoryMissing(root.clone()));
        }

        let rules = self.config.glob_rules()?;
        let templated_sets = self.templated_glob_sets()?;
        let limit = self.config.maximum_file_size_to_cache_in_bytes;

        let mut report = BuildReport::default();
        let mut assets = Vec::new();
        let mut entries: BTreeMap<String, ManifestEntry> = BTreeMap::new();

        for dent in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let dent = dent?;
            if !dent.file_type().is_file() {
                continue;
            }

            let path = dent.path();
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let url = to_slash_path(rel);

            // Ignored files (globIgnores, swDest) never feed a templated URL
            let decision = rules.classify(rel);
            let templated_dep = decision != GlobMatch::Ignored
                && templated_sets.iter().any(|set| set.is_match(url.as_str()));
            if !decision.is_included() && !templated_dep {
                debug!(%url, ?decision, "skipping");
                continue;
            }

            let size = dent.metadata()?.len();
            let precache = decision.is_included() && size <= limit;
            if decision.is_included() && !precache {
                let message = format!(
                    "{} is {} bytes, and won't be precached. \
                     Configure maximumFileSizeToCacheInBytes to change this limit.",
                    url, size
                );
                warn!("{}", message);
                report.warnings.push(message);
            }
            if !precache && !templated_dep {
                continue;
            }

            let revision = hash_file(path)?;
            if precache {
                debug!(%url, size, "precaching");
                entries.insert(
                    url.clone(),
                    ManifestEntry::new(url.clone(), revision.clone()).with_size(size),
                );
            }

            if templated_dep {
                assets.push(AssetFile {
                    url,
                    path: path.to_path_buf(),
                    size,
                    revision,
                });
            }
        }

        for (url, dependency) in &self.config.templated_urls {
            let revision = templated_revision(url, dependency, &assets)?;
            debug!(%url, "templated URL");
            // A templated URL replaces a file entry with the same URL
            entries.insert(url.clone(), ManifestEntry::new(url.clone(), revision));
        }

        let mut entries: Vec<ManifestEntry> = entries.into_values().collect();
        for transform in self.builtin_transforms() {
            entries = transform.transform(entries)?;
        }
        entries.sort_by(|a, b| a.url.cmp(&b.url));
        for transform in &self.transforms {
            debug!(name = transform.name(), "applying transform");
            entries = transform.transform(entries)?;
        }

        let manifest = PrecacheManifest { entries };
        if manifest.is_empty() {
            let message = format!("No files under {} matched globPatterns", root.display());
            warn!("{}", message);
            report.warnings.push(message);
        }

        report.count = manifest.len();
        report.size = manifest.total_size();
        info!(count = report.count, size = report.size, "built precache manifest");

        Ok(ManifestResult { manifest, report })
    }

    fn templated_glob_sets(&self) -> Result<Vec<PatternSet>, RulesError> {
        self.config
            .templated_urls
            .values()
            .filter_map(|dep| match dep {
                TemplatedDependency::Globs(globs) => Some(PatternSet::new(globs)),
                TemplatedDependency::Content(_) => None,
            })
            .collect()
    }

    fn builtin_transforms(&self) -> Vec<Box<dyn ManifestTransform>> {
        let mut transforms: Vec<Box<dyn ManifestTransform>> = Vec::new();
        if !self.config.modify_url_prefix.is_empty() {
            transforms.push(Box::new(ModifyUrlPrefix::new(&self.config.modify_url_prefix)));
        }
        if let Some(pattern) = &self.config.dont_cache_bust_urls_matching {
            transforms.push(Box::new(CacheBustExemption::new(pattern.clone())));
        }
        transforms
    }
}

/// Hex SHA-256 of a file's contents
pub fn hash_file(path: &Path) -> Result<String, ManifestError> {
    let io_err = |source: io::Error| ManifestError::IoError {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(io_err)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(io_err)?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::UrlPattern;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "index.html", "<html></html>");
        write(root, "static/js/app.3f9a8b2c.js", "console.log(1)");
        write(root, "static/js/app.3f9a8b2c.js.map", "{}");
        write(root, "static/css/main.css", "body{}");
        write(root, "sw-register.js", "register()");
        write(root, "server/render.js", "render()");
        write(root, "service-worker.js", "old build");
        write(root, "data.json", "{}");
        dir
    }

    fn config_for(dir: &TempDir) -> SwBuildConfig {
        SwBuildConfig {
            sw_src: dir.path().join("../core/service-worker.js"),
            sw_dest: dir.path().join("service-worker.js"),
            glob_directory: dir.path().to_path_buf(),
            glob_patterns: vec!["**/*.{html,js,css,eot,svg,ttf,woff}".to_string()],
            glob_ignores: vec![
                "sw-register.js".to_string(),
                "**/*.map".to_string(),
                "node_modules/*".to_string(),
                "server/*".to_string(),
            ],
            dont_cache_bust_urls_matching: Some(UrlPattern::versioned_default()),
            maximum_file_size_to_cache_in_bytes: 2 * 1024 * 1024,
            templated_urls: BTreeMap::new(),
            modify_url_prefix: BTreeMap::new(),
        }
    }

    fn urls(result: &ManifestResult) -> Vec<&str> {
        result.manifest.entries.iter().map(|e| e.url.as_str()).collect()
    }

    #[test]
    fn test_build_applies_patterns_and_ignores() {
        let dir = fixture();
        let config = config_for(&dir);
        let result = ManifestBuilder::new(&config).build().unwrap();

        assert_eq!(
            urls(&result),
            vec!["index.html", "static/css/main.css", "static/js/app.3f9a8b2c.js"]
        );
        assert_eq!(result.report.count, 3);
        assert!(result.report.warnings.is_empty());
    }

    #[test]
    fn test_versioned_urls_have_no_revision() {
        let dir = fixture();
        let config = config_for(&dir);
        let result = ManifestBuilder::new(&config).build().unwrap();

        let hashed = result.manifest.find_entry("static/js/app.3f9a8b2c.js").unwrap();
        assert_eq!(hashed.revision, None);

        let plain = result.manifest.find_entry("index.html").unwrap();
        let expected = hex::encode(Sha256::digest(b"<html></html>"));
        assert_eq!(plain.revision.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn test_oversized_files_are_skipped_with_warning() {
        let dir = fixture();
        write(dir.path(), "big.js", &"x".repeat(64));
        let mut config = config_for(&dir);
        config.maximum_file_size_to_cache_in_bytes = 32;

        let result = ManifestBuilder::new(&config).build().unwrap();

        assert!(result.manifest.find_entry("big.js").is_none());
        assert_eq!(result.report.warnings.len(), 1);
        assert!(result.report.warnings[0].contains("big.js"));
    }

    #[test]
    fn test_report_size_sums_files() {
        let dir = fixture();
        let config = config_for(&dir);
        let result = ManifestBuilder::new(&config).build().unwrap();

        let expected = ("<html></html>".len() + "console.log(1)".len() + "body{}".len()) as u64;
        assert_eq!(result.report.size, expected);
    }

    #[test]
    fn test_templated_urls() {
        let dir = fixture();
        write(dir.path(), "server/templates/shell.tpl", "{{ body }}");
        let mut config = config_for(&dir);
        config.templated_urls.insert(
            "/".to_string(),
            TemplatedDependency::Globs(vec!["server/templates/*.tpl".to_string()]),
        );
        config.templated_urls.insert(
            "/offline".to_string(),
            TemplatedDependency::Content("offline-v1".to_string()),
        );

        let result = ManifestBuilder::new(&config).build().unwrap();

        let shell = result.manifest.find_entry("/").unwrap();
        assert!(shell.revision.is_some());
        // The template itself is not precached
        assert!(result.manifest.find_entry("server/templates/shell.tpl").is_none());

        let offline = result.manifest.find_entry("/offline").unwrap();
        let expected = hex::encode(Sha256::digest(b"offline-v1"));
        assert_eq!(offline.revision.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn test_templated_url_without_match_fails() {
        let dir = fixture();
        let mut config = config_for(&dir);
        config.templated_urls.insert(
            "/".to_string(),
            TemplatedDependency::Globs(vec!["views/*.html".to_string()]),
        );

        let err = ManifestBuilder::new(&config).build().unwrap_err();
        assert!(matches!(err, ManifestError::TemplatedUrlNoMatch { .. }));
    }

    #[test]
    fn test_templated_globs_skip_ignored_files() {
        let dir = fixture();
        let mut config = config_for(&dir);
        config.templated_urls.insert(
            "/".to_string(),
            TemplatedDependency::Globs(vec!["**/*.js".to_string()]),
        );
        let revision = |config: &SwBuildConfig| {
            let result = ManifestBuilder::new(config).build().unwrap();
            result.manifest.find_entry("/").unwrap().revision.clone()
        };

        let before = revision(&config);

        // swDest and globIgnores matches don't count as dependencies
        write(dir.path(), "service-worker.js", "new build");
        write(dir.path(), "sw-register.js", "register(2)");
        assert_eq!(revision(&config), before);

        write(dir.path(), "static/js/app.3f9a8b2c.js", "console.log(2)");
        assert_ne!(revision(&config), before);
    }

    #[test]
    fn test_dotfiles_are_not_precached() {
        let dir = fixture();
        write(dir.path(), ".hidden.js", "hidden()");
        write(dir.path(), ".well-known/assetlinks.js", "links()");
        let mut config = config_for(&dir);

        let result = ManifestBuilder::new(&config).build().unwrap();
        assert!(result.manifest.find_entry(".hidden.js").is_none());
        assert!(result.manifest.find_entry(".well-known/assetlinks.js").is_none());

        config.glob_patterns.push(".well-known/*.js".to_string());
        let result = ManifestBuilder::new(&config).build().unwrap();
        assert!(result.manifest.find_entry(".well-known/assetlinks.js").is_some());
        assert!(result.manifest.find_entry(".hidden.js").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_oversized_files_are_not_read() {
        use std::os::unix::fs::PermissionsExt;

        let dir = fixture();
        write(dir.path(), "big.js", &"x".repeat(64));
        let big = dir.path().join("big.js");
        fs::set_permissions(&big, fs::Permissions::from_mode(0o000)).unwrap();
        let mut config = config_for(&dir);
        config.maximum_file_size_to_cache_in_bytes = 32;

        // Unreadable, but skipped on size before any read
        let result = ManifestBuilder::new(&config).build();
        fs::set_permissions(&big, fs::Permissions::from_mode(0o644)).unwrap();

        let result = result.unwrap();
        assert!(result.manifest.find_entry("big.js").is_none());
        assert_eq!(result.report.warnings.len(), 1);
    }

    #[test]
    fn test_modify_url_prefix_runs_before_cache_bust() {
        let dir = fixture();
        let mut config = config_for(&dir);
        config
            .modify_url_prefix
            .insert("static/".to_string(), "/assets/".to_string());

        let result = ManifestBuilder::new(&config).build().unwrap();

        let entry = result.manifest.find_entry("/assets/js/app.3f9a8b2c.js").unwrap();
        assert_eq!(entry.revision, None);
        assert!(result.manifest.find_entry("/assets/css/main.css").is_some());
    }

    struct PrefixAll(&'static str);

    impl ManifestTransform for PrefixAll {
        fn name(&self) -> &str {
            "prefix-all"
        }

        fn transform(
            &self,
            entries: Vec<ManifestEntry>,
        ) -> Result<Vec<ManifestEntry>, ManifestError> {
            Ok(entries
                .into_iter()
                .map(|mut e| {
                    e.url = format!("{}{}", self.0, e.url);
                    e
                })
                .collect())
        }
    }

    struct Reject;

    impl ManifestTransform for Reject {
        fn name(&self) -> &str {
            "reject"
        }

        fn transform(&self, _: Vec<ManifestEntry>) -> Result<Vec<ManifestEntry>, ManifestError> {
            Err(ManifestError::TransformFailed {
                name: self.name().to_string(),
                message: "nope".to_string(),
            })
        }
    }

    #[test]
    fn test_custom_transforms_run_last() {
        let dir = fixture();
        let config = config_for(&dir);

        let result = ManifestBuilder::new(&config)
            .with_transform(PrefixAll("/app/"))
            .build()
            .unwrap();

        // Cache-bust exemption already applied to the original URL
        let entry = result.manifest.find_entry("/app/static/js/app.3f9a8b2c.js").unwrap();
        assert_eq!(entry.revision, None);
    }

    #[test]
    fn test_transform_error_propagates() {
        let dir = fixture();
        let config = config_for(&dir);

        let err = ManifestBuilder::new(&config)
            .with_transform(Reject)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("reject"));
    }

    #[test]
    fn test_missing_glob_directory() {
        let dir = TempDir::new().unwrap();
        let mut config = config_for(&dir);
        config.glob_directory = dir.path().join("nope");

        let err = ManifestBuilder::new(&config).build().unwrap_err();
        assert!(matches!(err, ManifestError::GlobDirectoryMissing(_)));
    }

    #[test]
    fn test_empty_match_warns() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "readme.txt", "hi");
        let config = config_for(&dir);

        let result = ManifestBuilder::new(&config).build().unwrap();
        assert!(result.manifest.is_empty());
        assert_eq!(result.report.warnings.len(), 1);
    }
}
