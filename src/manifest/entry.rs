//! Precache manifest entries

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// A single entry in the precache manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// URL the service worker fetches
    pub url: String,

    /// Content hash, absent for URLs that are already versioned
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub revision: Option<String>,

    /// Size in bytes of the backing file (0 for templated URLs)
    #[serde(skip)]
    pub size: u64,
}

impl ManifestEntry {
    pub fn new(url: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            revision: Some(revision.into()),
            size: 0,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }
}

/// The generated precache manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrecacheManifest {
    pub entries: Vec<ManifestEntry>,
}

impl PrecacheManifest {
    /// Serialize to pretty JSON, the shape injected into the service worker
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total size of the files behind the entries
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    /// Find an entry by URL
    pub fn find_entry(&self, url: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.url == url)
    }
}
