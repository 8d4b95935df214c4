//! Document discovery and docname/path mapping for a source tree.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Config;
use crate::error::Error;

/// The source tree: where documents live and how their names map to files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Artifacts directory; never scanned for documents.
    artifacts_dir: PathBuf,
    /// Docnames found by the last discovery.
    docnames: BTreeSet<String>,
    /// Source root directory.
    source_root: PathBuf,
    /// File suffix identifying documents.
    source_suffix: String,
}

impl Project {
    /// Map a docname to its source file, absolute or relative to the source root.
    pub fn doc2path(&self, docname: &str, absolute: bool) -> PathBuf {
        let relative = PathBuf::from(format!("{docname}{}", self.source_suffix));
        if absolute {
            return self.source_root.join(relative);
        }
        return relative;
    }

    /// Docnames found by the last discovery.
    pub const fn docnames(&self) -> &BTreeSet<String> {
        return &self.docnames;
    }

    /// Walk the source root and collect every document that passes the
    /// configured include/exclude filters. Replaces the previously discovered set.
    ///
    /// # Errors
    ///
    /// Returns `Error::DiscoveryFailed` naming the root if the walk fails.
    pub fn discover(&mut self, config: &Config) -> Result<&BTreeSet<String>, Error> {
        let mut found = BTreeSet::new();
        let walker = WalkDir::new(&self.source_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| return !e.path().starts_with(&self.artifacts_dir));
        for entry in walker {
            let entry = entry.map_err(|e| {
                return Error::DiscoveryFailed {
                    reason: e.to_string(),
                    root: self.source_root.clone(),
                };
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(docname) = self.path2doc(entry.path()) else {
                continue;
            };
            if config.should_scan(&slash_path(&self.doc2path(&docname, false))) {
                found.insert(docname);
            }
        }
        self.docnames = found;
        return Ok(&self.docnames);
    }

    /// Build a project for `source_root` using the configured suffix and artifacts dir.
    pub fn new(source_root: &Path, config: &Config) -> Self {
        return Self {
            artifacts_dir: config.artifacts_path(source_root),
            docnames: BTreeSet::new(),
            source_root: source_root.to_path_buf(),
            source_suffix: config.source_suffix.clone(),
        };
    }

    /// Map a source file (absolute, or relative to the root) to its docname.
    /// Returns `None` for files outside the root or without the source suffix.
    pub fn path2doc(&self, path: &Path) -> Option<String> {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.source_root).ok()?
        } else {
            path
        };
        let relative = slash_path(relative);
        let docname = relative.strip_suffix(self.source_suffix.as_str())?;
        if docname.is_empty() {
            return None;
        }
        return Some(docname.to_string());
    }

    /// Resolve a file referenced from a document. Names starting with `/` are
    /// relative to the source root, others to the referring document's directory.
    /// Returns the root-relative name and the absolute path.
    pub fn relfn2path(&self, filename: &str, docname: Option<&str>) -> (String, PathBuf) {
        let relative = if let Some(rooted) = filename.strip_prefix('/') {
            normalize_path(Path::new(rooted))
        } else {
            let doc_dir = docname
                .and_then(|d| return Path::new(d).parent())
                .unwrap_or_else(|| return Path::new(""));
            normalize_path(&doc_dir.join(filename))
        };
        let absolute = normalize_path(&self.source_root.join(&relative));
        return (slash_path(&relative), absolute);
    }

    /// Source root directory.
    pub fn source_root(&self) -> &Path {
        return &self.source_root;
    }
}

/// Resolve `target` against the directory of docname `base`. A leading `/`
/// makes the target relative to the source root instead.
pub fn docname_join(base: &str, target: &str) -> String {
    if let Some(rooted) = target.strip_prefix('/') {
        return slash_path(&normalize_path(Path::new(rooted)));
    }
    let dir = Path::new(base).parent().unwrap_or_else(|| return Path::new(""));
    return slash_path(&normalize_path(&dir.join(target)));
}

/// Collapse `.` and `..` components in a path without touching the filesystem.
/// Preserves leading `..` when there is nothing left to pop.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        push_normalized_component(&mut components, component);
    }
    return components.iter().collect();
}

/// Handle a single path component during normalization.
/// Pops the last component for `..` when possible, preserves it otherwise.
fn push_normalized_component<'a>(components: &mut Vec<Component<'a>>, component: Component<'a>) {
    match component {
        Component::CurDir => {},
        Component::ParentDir => {
            let can_pop = matches!(
                components.last(),
                Some(c) if !matches!(c, Component::ParentDir | Component::RootDir)
            );
            if can_pop {
                components.pop();
            } else {
                components.push(component);
            }
        },
        other => components.push(other),
    }
    return;
}

/// Render a relative path with `/` separators regardless of platform.
pub fn slash_path(path: &Path) -> String {
    return path
        .components()
        .map(|c| return c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
}
