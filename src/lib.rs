//! sw-precache - service worker precache manifest generation
//!
//! This crate models the service worker build configuration record and
//! implements its consumer: it matches the build output against the
//! configured globs, computes content revisions, and injects the resulting
//! precache manifest into the service worker template.

pub mod config;
pub mod inject;
pub mod manifest;
pub mod rules;

pub use config::{BuildPaths, ConfigError, EffectiveConfig, SwBuildConfig, TemplatedDependency};
pub use inject::{build_and_inject, inject_manifest, InjectError, InjectResult};
pub use manifest::{
    BuildReport, ManifestBuilder, ManifestEntry, ManifestError, ManifestTransform,
    PrecacheManifest,
};
pub use rules::{GlobMatch, GlobRules, RulesError, UrlPattern};
