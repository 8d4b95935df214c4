/// Core domain types for documents, staleness, and navigation relations.
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::tree::Node;

/// Everything the inventory remembers about one docname.
/// Mutated only while that document is being read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Absolute, normalized paths of external files this document depends on.
    #[serde(default)]
    pub dependencies: BTreeSet<PathBuf>,
    /// Figure numbering: figure type -> figure id -> number path.
    /// Supplied by a numbering collector through [`crate::Inventory::set_numbering`].
    #[serde(default)]
    pub fignumbers: BTreeMap<String, BTreeMap<String, Vec<u32>>>,
    /// Docnames whose source this document pulls in (exempts them from orphan warnings).
    #[serde(default)]
    pub includes: BTreeSet<String>,
    /// Arbitrary metadata; the `orphan` key suppresses the not-included warning.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Time of the last successful read in microseconds since the epoch.
    /// `None` until the document has been read once.
    #[serde(default)]
    pub read_at: Option<i64>,
    /// Re-read unconditionally on the next run.
    #[serde(default)]
    pub reread: bool,
    /// Section numbering: section anchor -> number path; `""` is the document itself.
    /// Supplied by a numbering collector through [`crate::Inventory::set_numbering`].
    #[serde(default)]
    pub secnumbers: BTreeMap<String, Vec<u32>>,
    /// Cached title node.
    #[serde(default)]
    pub title: Option<Node>,
    /// Cached navigation subtree (the document's own table of contents).
    #[serde(default)]
    pub toc: Option<Node>,
}

/// Result of a staleness pass over the discovered document set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutdatedFiles {
    /// Discovered docnames with no prior record (or every docname on a forced rebuild).
    pub added: BTreeSet<String>,
    /// Known docnames that must be reprocessed.
    pub changed: BTreeSet<String>,
    /// Known docnames that are no longer discovered.
    pub removed: BTreeSet<String>,
}

/// Navigation neighbours of one docname in pre-order traversal of the inclusion graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Relation {
    /// Immediate successor in traversal order.
    pub next: Option<String>,
    /// Document whose navigation tree first includes this one.
    pub parent: Option<String>,
    /// Immediate predecessor in traversal order.
    pub previous: Option<String>,
}

/// Doctree versioning method; only inventories with the same method may share artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersioningMethod {
    /// Versioning disabled.
    None,
    /// Version translatable text nodes.
    Text,
}

impl DocumentRecord {
    /// Whether the metadata marks this document as intentionally unreferenced.
    pub fn is_orphan(&self) -> bool {
        return self.metadata.contains_key("orphan");
    }
}

impl VersioningMethod {
    /// Look a method up by name.
    pub fn from_name(name: &str) -> Option<Self> {
        return match name {
            "none" => Some(VersioningMethod::None),
            "text" => Some(VersioningMethod::Text),
            _ => None,
        };
    }

    /// Stable name used in configuration and diagnostics.
    pub const fn name(self) -> &'static str {
        return match self {
            VersioningMethod::None => "none",
            VersioningMethod::Text => "text",
        };
    }
}
