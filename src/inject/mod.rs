//! Manifest injection into the service worker template
//!
//! The template at `swSrc` carries an empty `precache([])` call. The
//! generated manifest replaces the empty array and the result is written
//! to `swDest`.

use regex_lite::Regex;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::config::SwBuildConfig;
use crate::manifest::{BuildReport, ManifestBuilder, ManifestError, PrecacheManifest};

/// Matches `precache([])`, tolerating whitespace inside the call
pub const INJECTION_POINT_PATTERN: &str = r"(precache\()\s*\[\s*\]\s*(\))";

/// Errors for manifest injection
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    #[error("IO error on {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No injection point `precache([])` found in {0}")]
    NoInjectionPoint(PathBuf),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Result of writing a service worker
#[derive(Debug, Clone)]
pub struct InjectResult {
    /// Where the service worker was written
    pub sw_dest: PathBuf,
    pub manifest: PrecacheManifest,
    pub report: BuildReport,
}

fn injection_point() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(INJECTION_POINT_PATTERN).expect("injection point pattern is valid"))
}

/// Replace the first injection point in `template` with the manifest.
///
/// Returns `None` when the template has no injection point.
pub fn render(template: &str, manifest: &PrecacheManifest) -> Result<Option<String>, InjectError> {
    let re = injection_point();

    let Some(caps) = re.captures(template) else {
        return Ok(None);
    };
    let (Some(whole), Some(open), Some(close)) = (caps.get(0), caps.get(1), caps.get(2)) else {
        return Ok(None);
    };

    if re.find_iter(template).count() > 1 {
        warn!("template has more than one injection point; only the first is replaced");
    }

    let json = manifest.to_json()?;
    let mut out = String::with_capacity(template.len() + json.len());
    out.push_str(&template[..whole.start()]);
    out.push_str(open.as_str());
    out.push_str(&json);
    out.push_str(close.as_str());
    out.push_str(&template[whole.end()..]);

    Ok(Some(out))
}

/// Write `manifest` into the template at `swSrc`, producing `swDest`
pub fn inject_manifest(
    config: &SwBuildConfig,
    manifest: &PrecacheManifest,
) -> Result<PathBuf, InjectError> {
    let src = &config.sw_src;
    let template = fs::read_to_string(src).map_err(|source| InjectError::IoError {
        path: src.clone(),
        source,
    })?;

    let rendered =
        render(&template, manifest)?.ok_or_else(|| InjectError::NoInjectionPoint(src.clone()))?;

    let dest = &config.sw_dest;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|source| InjectError::IoError {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(dest, rendered).map_err(|source| InjectError::IoError {
        path: dest.clone(),
        source,
    })?;

    info!(
        sw_src = %src.display(),
        sw_dest = %dest.display(),
        entries = manifest.len(),
        "wrote service worker"
    );
    Ok(dest.clone())
}

/// Build the manifest and write the service worker in one step
pub fn build_and_inject(config: &SwBuildConfig) -> Result<InjectResult, InjectError> {
    let result = ManifestBuilder::new(config).build()?;
    let sw_dest = inject_manifest(config, &result.manifest)?;

    Ok(InjectResult {
        sw_dest,
        manifest: result.manifest,
        report: result.report,
    })
}
