//! Include/ignore glob rules
//!
//! Patterns follow node-glob conventions: `*` stays within one path
//! segment, `**` spans directories and `{a,b}` alternates. Wildcards do
//! not match dot-segments: a path with a segment starting with `.` is only
//! matched by a pattern that itself spells a leading-dot segment.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Component, Path};

use super::RulesError;

/// Outcome of matching a relative path against the rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobMatch {
    /// Matched a pattern and no ignore
    Included,
    /// Matched an ignore (regardless of patterns)
    Ignored,
    /// Matched no pattern
    Unmatched,
}

impl GlobMatch {
    pub fn is_included(self) -> bool {
        self == GlobMatch::Included
    }
}

/// Include patterns with node-glob dotfile handling
#[derive(Debug, Clone)]
pub struct PatternSet {
    all: GlobSet,
    /// Only the patterns naming a dot-segment explicitly
    dotted: GlobSet,
}

impl PatternSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, RulesError> {
        let dotted: Vec<&str> = patterns
            .iter()
            .map(|p| p.as_ref())
            .filter(|p| names_dot_segment(p))
            .collect();

        Ok(Self {
            all: compile_globs(patterns)?,
            dotted: compile_globs(&dotted)?,
        })
    }

    /// Match a `/`-separated relative path
    pub fn is_match(&self, rel: &str) -> bool {
        if has_dot_segment(rel) {
            self.dotted.is_match(rel)
        } else {
            self.all.is_match(rel)
        }
    }
}

fn names_dot_segment(pattern: &str) -> bool {
    pattern
        .split('/')
        .any(|seg| seg.starts_with('.') && seg != "." && seg != "..")
}

fn has_dot_segment(rel: &str) -> bool {
    rel.split('/').any(|seg| seg.starts_with('.') && seg != "..")
}

/// Compiled `globPatterns` and `globIgnores`
#[derive(Debug, Clone)]
pub struct GlobRules {
    patterns: PatternSet,
    ignores: GlobSet,
    ignore_sources: Vec<String>,
}

/// Compile a list of glob strings into a set
pub fn compile_globs<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet, RulesError> {
    let mut builder = GlobSetBuilder::new();

    for pattern in patterns {
        let pattern = pattern.as_ref();
        if pattern.is_empty() {
            continue;
        }
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|source| RulesError::InvalidGlob {
                pattern: pattern.to_string(),
                source,
            })?;
        builder.add(glob);
    }

    builder.build().map_err(|source| RulesError::InvalidGlob {
        pattern: patterns
            .iter()
            .map(|p| p.as_ref())
            .collect::<Vec<_>>()
            .join(", "),
        source,
    })
}

/// Render a relative path with `/` separators, dropping `.` components
pub fn to_slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

impl GlobRules {
    /// Compile rules from pattern and ignore lists
    pub fn new<S: AsRef<str>>(patterns: &[S], ignores: &[S]) -> Result<Self, RulesError> {
        Ok(Self {
            patterns: PatternSet::new(patterns)?,
            ignores: compile_globs(ignores)?,
            ignore_sources: ignores.iter().map(|s| s.as_ref().to_string()).collect(),
        })
    }

    /// Add literal paths to ignore, escaping glob metacharacters
    pub fn with_ignored_paths<S: AsRef<str>>(self, paths: &[S]) -> Result<Self, RulesError> {
        let escaped: Vec<String> = paths.iter().map(|p| globset::escape(p.as_ref())).collect();
        self.with_extra_ignores(&escaped)
    }

    /// Add ignore patterns on top of the existing ones
    pub fn with_extra_ignores<S: AsRef<str>>(mut self, extra: &[S]) -> Result<Self, RulesError> {
        self.ignore_sources
            .extend(extra.iter().map(|s| s.as_ref().to_string()));
        self.ignores = compile_globs(&self.ignore_sources)?;
        Ok(self)
    }

    /// Classify a path relative to the glob directory
    pub fn classify(&self, path: &Path) -> GlobMatch {
        let rel = to_slash_path(path);

        // Ignores win over patterns for the same path
        if self.ignores.is_match(rel.as_str()) {
            GlobMatch::Ignored
        } else if self.patterns.is_match(rel.as_str()) {
            GlobMatch::Included
        } else {
            GlobMatch::Unmatched
        }
    }

    /// Check if a path belongs in the manifest
    pub fn is_included(&self, path: &Path) -> bool {
        self.classify(path).is_included()
    }
}
