//! Inventory snapshot persistence: versioned serialization and restore validation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::assets::AssetRegistry;
use crate::config::ConfigFingerprint;
use crate::error::Error;
use crate::types::{DocumentRecord, VersioningMethod};

/// Core schema version; part of every version stamp.
pub const CORE_VERSION: u32 = 1;

/// File name of the snapshot inside the artifacts directory.
pub const SNAPSHOT_FILE: &str = "environment.json";

/// Encoding schema of the snapshot file itself, checked before anything else is decoded.
pub const SNAPSHOT_SCHEMA: u32 = 1;

/// The persisted state of an inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    /// Image and download registries.
    #[serde(default)]
    pub assets: AssetRegistry,
    /// Fingerprint of the configuration the snapshot was built with.
    #[serde(default)]
    pub config: Option<ConfigFingerprint>,
    /// Every known document.
    pub documents: BTreeMap<String, DocumentRecord>,
    /// Exported domain data keyed by domain name.
    #[serde(default)]
    pub domain_data: BTreeMap<String, serde_json::Value>,
    /// Encoding schema, always [`SNAPSHOT_SCHEMA`] when written.
    pub schema: u32,
    /// Source root the inventory was built for.
    pub source_root: PathBuf,
    /// Navigation inclusion graph: docname -> included docnames in order.
    #[serde(default)]
    pub toctree_includes: BTreeMap<String, Vec<String>>,
    /// Combined core and per-domain version stamp.
    pub version: VersionStamp,
    /// Doctree versioning method applied to this state, if any.
    #[serde(default)]
    pub versioning: Option<VersioningMethod>,
}

/// Combined version stamp: `core` plus one entry per registered domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStamp(
    /// Component name -> schema version.
    pub BTreeMap<String, u32>,
);

/// Minimal view of a snapshot used to check the schema before full decoding.
#[derive(Deserialize)]
struct SchemaHeader {
    /// Encoding schema, absent in files not written by this crate.
    #[serde(default)]
    schema: Option<u32>,
}

impl InventorySnapshot {
    /// Decode a snapshot from JSON. The schema field is checked first so that a
    /// file from an incompatible encoding yields a version error, not a decode error.
    ///
    /// # Errors
    ///
    /// Returns `Error::VersionMismatch` for a foreign schema, or `Error::Json` if
    /// the content is malformed.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let header: SchemaHeader = serde_json::from_str(content)?;
        if header.schema != Some(SNAPSHOT_SCHEMA) {
            return Err(Error::VersionMismatch {
                expected: format!("schema {SNAPSHOT_SCHEMA}"),
                found: header.schema.map_or_else(|| return "no schema".to_string(), |s| return format!("schema {s}")),
            });
        }
        return Ok(serde_json::from_str(content)?);
    }

    /// Read a snapshot from disk. A missing file is not an error: there is simply
    /// no previous state.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` for read failures other than not-found, and any error
    /// from [`InventorySnapshot::parse`].
    pub fn read(path: &Path) -> Result<Option<Self>, Error> {
        let content = match std::fs::read_to_string(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };
        return Self::parse(&content).map(Some);
    }

    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if serialization fails.
    pub fn serialize(&self) -> Result<String, Error> {
        return Ok(serde_json::to_string_pretty(self)?);
    }

    /// Check that the snapshot may be reused by a run with `version` and `source_root`.
    /// Any mismatch invalidates the whole snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Error::VersionMismatch` or `Error::SourceRootChanged`.
    pub fn validate(&self, version: &VersionStamp, source_root: &Path) -> Result<(), Error> {
        if &self.version != version {
            return Err(Error::VersionMismatch {
                expected: version.to_string(),
                found: self.version.to_string(),
            });
        }
        if self.source_root != source_root {
            return Err(Error::SourceRootChanged {
                current: source_root.to_path_buf(),
                recorded: self.source_root.clone(),
            });
        }
        return Ok(());
    }

    /// Write the snapshot, creating the artifacts directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if serialization fails, or `Error::Io` if the file
    /// cannot be written.
    pub fn write(&self, path: &Path) -> Result<(), Error> {
        let content = self.serialize()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        return Ok(());
    }
}

impl VersionStamp {
    /// Stamp for the core schema plus the given per-domain versions.
    pub fn new<I>(domains: I) -> Self
    where
        I: IntoIterator<Item = (String, u32)>,
    {
        let mut components: BTreeMap<String, u32> = domains.into_iter().collect();
        components.insert("core".to_string(), CORE_VERSION);
        return Self(components);
    }
}

impl std::fmt::Display for VersionStamp {
    /// `core=1 std=1` style rendering.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| return format!("{k}={v}")).collect();
        return write!(f, "{}", parts.join(" "));
    }
}
