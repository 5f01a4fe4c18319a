//! Revisions for templated URLs

use sha2::{Digest, Sha256};

use super::{AssetFile, ManifestError};
use crate::config::TemplatedDependency;
use crate::rules::PatternSet;

/// Compute the revision of a templated URL.
///
/// A glob list hashes the revisions of every asset it matches, in path
/// order. A literal hashes the string itself.
pub fn templated_revision(
    url: &str,
    dependency: &TemplatedDependency,
    assets: &[AssetFile],
) -> Result<String, ManifestError> {
    match dependency {
        TemplatedDependency::Content(content) => Ok(hex::encode(Sha256::digest(content.as_bytes()))),
        TemplatedDependency::Globs(patterns) => {
            let set = PatternSet::new(patterns)?;

            let mut hasher = Sha256::new();
            let mut matched = 0usize;
            for asset in assets.iter().filter(|a| set.is_match(a.url.as_str())) {
                hasher.update(asset.revision.as_bytes());
                matched += 1;
            }

            if matched == 0 {
                return Err(ManifestError::TemplatedUrlNoMatch {
                    url: url.to_string(),
                    patterns: patterns.join(", "),
                });
            }

            Ok(hex::encode(hasher.finalize()))
        }
    }
}
