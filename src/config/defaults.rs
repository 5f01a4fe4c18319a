//! Built-in defaults (layer 1)
//!
//! Defaults are derived from the project layout: where the build output
//! lands and where the configuration directory sits.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use super::record::SwBuildConfig;
use crate::rules::UrlPattern;

/// File name of the generated service worker
pub const SERVICE_WORKER_FILE: &str = "service-worker.js";

/// 2 MiB
pub const DEFAULT_MAXIMUM_FILE_SIZE: u64 = 2 * 1024 * 1024;

/// Default include patterns
pub const DEFAULT_GLOB_PATTERNS: &[&str] = &["**/*.{html,js,css,eot,svg,ttf,woff}"];

/// Default ignore patterns
pub const DEFAULT_GLOB_IGNORES: &[&str] = &[
    "sw-register.js",
    "**/*.map",
    "node_modules/*",
    "server/*",
];

/// Project layout the defaults are computed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPaths {
    /// Project root; relative config paths resolve against it
    pub root: PathBuf,

    /// Build output directory
    pub build_dir: PathBuf,

    /// Directory holding the configuration files
    pub config_dir: PathBuf,
}

impl BuildPaths {
    /// Layout rooted at `root` with `dist/` and `config/` beneath it
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = normalize_path(&root.into());
        Self {
            build_dir: root.join("dist"),
            config_dir: root.join("config"),
            root,
        }
    }

    /// Override the build output directory (relative to the root)
    pub fn with_build_dir(mut self, build_dir: impl AsRef<Path>) -> Self {
        self.build_dir = normalize_path(&self.root.join(build_dir));
        self
    }

    /// Override the configuration directory (relative to the root)
    pub fn with_config_dir(mut self, config_dir: impl AsRef<Path>) -> Self {
        self.config_dir = normalize_path(&self.root.join(config_dir));
        self
    }

    /// Whether `path` is a file location strictly inside the build directory
    pub fn contains(&self, path: &Path) -> bool {
        let path = normalize_path(&self.root.join(path));
        path != self.build_dir && path.starts_with(&self.build_dir)
    }

    /// The built-in configuration for this layout
    pub fn builtin_config(&self) -> SwBuildConfig {
        // The template sits next to the config directory, under core/
        let sw_src = normalize_path(
            &self
                .config_dir
                .join("..")
                .join("core")
                .join(SERVICE_WORKER_FILE),
        );

        // Kept relative to the root, as the build tool runs from there
        let glob_directory = self
            .build_dir
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| self.build_dir.clone());

        SwBuildConfig {
            sw_src,
            sw_dest: self.build_dir.join(SERVICE_WORKER_FILE),
            glob_directory,
            glob_patterns: DEFAULT_GLOB_PATTERNS.iter().map(|s| s.to_string()).collect(),
            glob_ignores: DEFAULT_GLOB_IGNORES.iter().map(|s| s.to_string()).collect(),
            dont_cache_bust_urls_matching: Some(UrlPattern::versioned_default()),
            maximum_file_size_to_cache_in_bytes: DEFAULT_MAXIMUM_FILE_SIZE,
            templated_urls: BTreeMap::new(),
            modify_url_prefix: BTreeMap::new(),
        }
    }

    /// Convert the built-in configuration to a JSON value for merging.
    ///
    /// Fails when a layout path is not valid UTF-8.
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self.builtin_config())
    }
}

/// Lexically normalize a path, folding `.` and `..` components
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = match out.components().next_back() {
                    Some(Component::Normal(_)) => out.pop(),
                    _ => false,
                };
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }

    out
}
