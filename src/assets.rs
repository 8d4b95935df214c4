//! Registries of image and download files referenced by documents.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// One registered file: who references it and the unique output name it was given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    /// Docnames that reference the file.
    pub docnames: BTreeSet<String>,
    /// Collision-free output name.
    pub unique_name: String,
}

/// Image and download registries, keyed by root-relative file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRegistry {
    /// Downloadable files; unique names live under a digest directory.
    #[serde(default)]
    pub downloads: BTreeMap<String, AssetEntry>,
    /// Images; unique names are base names with a counter on collision.
    #[serde(default)]
    pub images: BTreeMap<String, AssetEntry>,
}

impl AssetRegistry {
    /// Register a downloadable file referenced from `docname` and return its unique name.
    pub fn add_download(&mut self, docname: &str, filename: &str) -> String {
        let entry = self.downloads.entry(filename.to_string()).or_insert_with(|| {
            let digest = Sha256::digest(filename.as_bytes());
            let hex = format!("{digest:x}");
            let dir = hex.get(..32).unwrap_or(&hex).to_string();
            return AssetEntry {
                docnames: BTreeSet::new(),
                unique_name: format!("{dir}/{}", base_name(filename)),
            };
        });
        entry.docnames.insert(docname.to_string());
        return entry.unique_name.clone();
    }

    /// Register an image referenced from `docname` and return its unique name.
    pub fn add_image(&mut self, docname: &str, filename: &str) -> String {
        if let Some(entry) = self.images.get_mut(filename) {
            entry.docnames.insert(docname.to_string());
            return entry.unique_name.clone();
        }
        let taken: BTreeSet<&str> = self.images.values().map(|e| return e.unique_name.as_str()).collect();
        let unique_name = unique_image_name(filename, &taken);
        self.images.insert(filename.to_string(), AssetEntry {
            docnames: std::iter::once(docname.to_string()).collect(),
            unique_name: unique_name.clone(),
        });
        return unique_name;
    }

    /// Drop `docname` from every entry; entries nobody references any more are removed.
    pub fn clear_doc(&mut self, docname: &str) {
        for registry in [&mut self.downloads, &mut self.images] {
            registry.retain(|_, entry| {
                entry.docnames.remove(docname);
                return !entry.docnames.is_empty();
            });
        }
        return;
    }

    /// Copy the entries `other` holds for `docnames` into this registry.
    pub fn merge(&mut self, docnames: &BTreeSet<String>, other: &AssetRegistry) {
        for (filename, entry) in &other.downloads {
            for docname in entry.docnames.intersection(docnames) {
                self.add_download(docname, filename);
            }
        }
        for (filename, entry) in &other.images {
            for docname in entry.docnames.intersection(docnames) {
                self.add_image(docname, filename);
            }
        }
        return;
    }
}

/// Final path component of a `/`-separated name.
fn base_name(filename: &str) -> &str {
    return filename.rsplit('/').next().unwrap_or(filename);
}

/// First of `name`, `stem0.ext`, `stem1.ext`, ... not already taken.
fn unique_image_name(filename: &str, taken: &BTreeSet<&str>) -> String {
    let base = base_name(filename);
    if !taken.contains(base) {
        return base.to_string();
    }
    let path = Path::new(base);
    let stem = path.file_stem().map_or_else(String::new, |s| return s.to_string_lossy().into_owned());
    let ext = path
        .extension()
        .map_or_else(String::new, |e| return format!(".{}", e.to_string_lossy()));
    let mut counter: u32 = 0;
    loop {
        let candidate = format!("{stem}{counter}{ext}");
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        counter = counter.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colliding_image_names_get_a_counter() {
        let mut assets = AssetRegistry::default();
        assert_eq!(assets.add_image("a", "img/logo.png"), "logo.png");
        assert_eq!(assets.add_image("b", "other/logo.png"), "logo0.png");
        assert_eq!(assets.add_image("c", "img/logo.png"), "logo.png");
        assert_eq!(assets.images.get("img/logo.png").unwrap().docnames.len(), 2);
    }

    #[test]
    fn downloads_live_under_a_digest_directory() {
        let mut assets = AssetRegistry::default();
        let name = assets.add_download("a", "files/data.csv");
        let (dir, base) = name.split_once('/').unwrap();
        assert_eq!(dir.len(), 32);
        assert_eq!(base, "data.csv");
    }

    #[test]
    fn clear_doc_drops_unreferenced_entries() {
        let mut assets = AssetRegistry::default();
        assets.add_image("a", "x.png");
        assets.add_image("b", "y.png");
        assets.add_image("a", "y.png");
        assets.clear_doc("a");
        assert!(!assets.images.contains_key("x.png"));
        assert_eq!(assets.images.get("y.png").unwrap().docnames.len(), 1);
    }

    #[test]
    fn merge_copies_only_requested_docnames() {
        let mut worker = AssetRegistry::default();
        worker.add_image("a", "a.png");
        worker.add_image("z", "z.png");
        let mut main = AssetRegistry::default();
        main.merge(&std::iter::once("a".to_string()).collect(), &worker);
        assert!(main.images.contains_key("a.png"));
        assert!(!main.images.contains_key("z.png"));
    }
}
