//! Effective configuration with provenance
//!
//! Merges the layers, deserializes the result into a `SwBuildConfig`,
//! resolves its paths and validates it. Records where each layer came from.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::debug;

use super::defaults::BuildPaths;
use super::merge::merge_layers;
use super::record::{SwBuildConfig, TemplatedDependency};
use crate::rules::{compile_globs, RulesError};

/// Origin of a configuration layer
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Cli,
}

/// A contributing config layer
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (files only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 of the raw file bytes (files only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// The validated configuration plus where it came from
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    /// When this config was computed
    pub created_at: DateTime<Utc>,

    /// The validated record
    config: SwBuildConfig,

    /// Contributing layers in precedence order
    pub sources: Vec<ConfigSource>,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Rules(#[from] RulesError),
}

impl EffectiveConfig {
    /// Build the effective config from builtin defaults, an optional
    /// config file and optional CLI overrides
    pub fn build(
        paths: &BuildPaths,
        config_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let builtin = paths
            .to_value()
            .map_err(|e| ConfigError::ParseError(format!("builtin defaults: {}", e)))?;
        let mut layers = vec![builtin];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        if let Some(path) = config_path {
            if path.exists() {
                let (value, digest) = load_config_file(path)?;
                debug!(path = %path.display(), %digest, "loaded config file");
                layers.push(value);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::File,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            } else {
                debug!(path = %path.display(), "config file not found, skipping");
            }
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        let config: SwBuildConfig = serde_json::from_value(merged)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        let config = config.resolved_against(&paths.root);

        validate(&config, paths)?;

        Ok(Self {
            created_at: Utc::now(),
            config,
            sources,
        })
    }

    /// The validated record
    pub fn config(&self) -> &SwBuildConfig {
        &self.config
    }

    pub fn into_config(self) -> SwBuildConfig {
        self.config
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Load a config file, returning its value and the digest of its bytes.
///
/// `.json` files are read as JSON, anything else as TOML.
fn load_config_file(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path)
        .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

    let digest = hex::encode(Sha256::digest(&bytes));

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let value = if is_json {
        serde_json::from_slice(&bytes).map_err(|e| {
            ConfigError::ParseError(format!("{}: JSON parse error: {}", path.display(), e))
        })?
    } else {
        let contents = String::from_utf8(bytes).map_err(|e| {
            ConfigError::ParseError(format!("{}: invalid UTF-8: {}", path.display(), e))
        })?;
        let table: toml::Value = toml::from_str(&contents).map_err(|e| {
            ConfigError::ParseError(format!("{}: TOML parse error: {}", path.display(), e))
        })?;
        toml_to_json(table)
    };

    if !value.is_object() {
        return Err(ConfigError::ParseError(format!(
            "{}: top level must be a table",
            path.display()
        )));
    }

    Ok((value, digest))
}

fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

fn validate(config: &SwBuildConfig, paths: &BuildPaths) -> Result<(), ConfigError> {
    if config.glob_patterns.iter().all(|p| p.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "globPatterns must contain at least one pattern".to_string(),
        ));
    }

    // Compiles both lists, surfacing the offending pattern
    config.glob_rules()?;

    for (url, dependency) in &config.templated_urls {
        if let TemplatedDependency::Globs(globs) = dependency {
            if globs.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "templatedUrls['{}'] must list at least one pattern",
                    url
                )));
            }
            compile_globs(globs)?;
        }
    }

    if config.maximum_file_size_to_cache_in_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "maximumFileSizeToCacheInBytes must be greater than 0".to_string(),
        ));
    }

    if !paths.contains(&config.sw_dest) {
        return Err(ConfigError::ValidationError(format!(
            "swDest {} must be inside the build directory {}",
            config.sw_dest.display(),
            paths.build_dir.display()
        )));
    }

    Ok(())
}
