//! Service worker build configuration
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults derived from the project layout
//! 2. Config file (TOML, or JSON by extension)
//! 3. CLI overrides

mod defaults;
mod effective;
mod merge;
mod record;

pub use defaults::{
    normalize_path, BuildPaths, DEFAULT_GLOB_IGNORES, DEFAULT_GLOB_PATTERNS,
    DEFAULT_MAXIMUM_FILE_SIZE, SERVICE_WORKER_FILE,
};
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig};
pub use merge::{deep_merge, merge_layers, parse_override};
pub use record::{SwBuildConfig, TemplatedDependency};
