//! The incremental inventory: every known document, its dependencies and
//! navigation structure, staleness decisions, and post-parse resolution.
//!
//! One inventory is not meant to be mutated from several threads. Parallel
//! reading hands independent clones to workers and folds their results back
//! with [`Inventory::merge_info_from`] (see [`crate::parallel`]).

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::assets::AssetRegistry;
use crate::config::{Config, ConfigFingerprint, ConfigStatus, classify_config_change};
use crate::diagnostics::{Category, Diagnostics};
use crate::domains::{Domain, DomainRegistry};
use crate::error::Error;
use crate::events::EventManager;
use crate::freshness::{has_doc_changed, now_micros};
use crate::project::{Project, normalize_path};
use crate::reader::{self, MarkupParser};
use crate::scratch::ScratchContext;
use crate::snapshot::{InventorySnapshot, SNAPSHOT_FILE, SNAPSHOT_SCHEMA, VersionStamp};
use crate::tags::Tags;
use crate::toctree::{self, NavigationResolver, TocTreeOptions, TocTreeResolver};
use crate::transforms::{Pipeline, Renderer, TransformContext};
use crate::tree::{self, Element, Node, tag};
use crate::types::{DocumentRecord, OutdatedFiles, Relation, VersioningMethod};

/// Suffix of per-document parsed-tree artifacts.
pub const DOCTREE_SUFFIX: &str = ".doctree";

/// Long-lived record of every document and the engine deciding what to rebuild.
#[derive(Debug, Clone)]
pub struct Inventory {
    /// Image and download registries.
    pub assets: AssetRegistry,
    /// Configuration of the current run.
    config: Config,
    /// How the current configuration relates to the persisted one.
    config_status: ConfigStatus,
    /// Read-through cache of artifact bytes; never persisted.
    doctree_cache: BTreeMap<String, Vec<u8>>,
    /// Registered domains.
    pub domains: DomainRegistry,
    /// Extension hooks.
    pub events: EventManager,
    /// Fingerprint of the current configuration.
    fingerprint: ConfigFingerprint,
    /// Resolver for navigation placeholders.
    navigation: Arc<dyn NavigationResolver>,
    /// Post-parse passes.
    pipeline: Pipeline,
    /// Source tree and discovered docnames.
    project: Project,
    /// Per-docname records, including documents currently being read.
    records: BTreeMap<String, DocumentRecord>,
    /// Per-document transient state.
    pub scratch: ScratchContext,
    /// Active build tags.
    tags: Tags,
    /// Navigation inclusion graph: docname -> included docnames in order.
    toctree_includes: BTreeMap<String, Vec<String>>,
    /// Doctree versioning method applied to this state.
    versioning: Option<VersioningMethod>,
    /// Whether versioning compares against the previous doctree.
    versioning_compare: bool,
    /// Trees produced during this run's read phase, consumed on resolution.
    write_cache: BTreeMap<String, Element>,
}

impl Inventory {
    /// Post-transform `tree` for `docname`: the scratch context is pointed at
    /// `docname` for the duration of the pipeline and restored afterwards, even
    /// when a pass fails. Fires `document-resolved` on success.
    ///
    /// # Errors
    ///
    /// Propagates the first pass failure.
    pub fn apply_post_transforms(
        &mut self,
        tree: &mut Element,
        docname: &str,
        renderer: &Renderer,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), Error> {
        let backup = self.scratch.clone();
        self.scratch.docname = docname.to_string();
        let result = {
            let mut ctx = TransformContext {
                diagnostics,
                docname,
                inventory: &*self,
                renderer,
            };
            self.pipeline.apply(tree, &mut ctx)
        };
        self.scratch = backup;
        result?;

        self.events.document_resolved(tree, docname);
        return Ok(());
    }

    /// Directory holding the snapshot and parsed-tree artifacts.
    pub fn artifacts_dir(&self) -> PathBuf {
        return self.config.artifacts_path(self.project.source_root());
    }

    /// Docnames reported by `env-get-updated` listeners, minus those already scheduled.
    pub fn check_dependents(&self, already: &BTreeSet<String>) -> BTreeSet<String> {
        return self
            .events
            .env_get_updated(self)
            .into_iter()
            .filter(|d| return !already.contains(d))
            .collect();
    }

    /// Report known documents unreachable from the root navigation tree (unless
    /// they are the root, orphans, or included by another document) and
    /// documents with several navigation parents. Then lets every domain and
    /// the `env-check-consistency` listeners add their own findings.
    pub fn check_consistency(&self, diagnostics: &mut Diagnostics) {
        // Self-reference warnings are reported by collect_relations itself.
        let relations = self.collect_relations(&mut Diagnostics::default());
        let included: BTreeSet<&String> = self.records.values().flat_map(|r| return r.includes.iter()).collect();

        for (docname, record) in self.known() {
            if *docname == self.config.root_doc || relations.contains_key(docname) {
                continue;
            }
            if included.contains(&docname) || record.is_orphan() {
                continue;
            }
            diagnostics.warn(
                Category::NotIncluded,
                Some(docname.as_str()),
                "document isn't included in any toctree".to_string(),
            );
        }

        let mut parents: BTreeMap<&String, Vec<&String>> = BTreeMap::new();
        for (parent, children) in &self.toctree_includes {
            for child in children {
                parents.entry(child).or_default().push(parent);
            }
        }
        for (docname, candidates) in parents.iter().filter(|(_, c)| return c.len() > 1) {
            let Some(selected) = candidates.iter().max() else {
                continue;
            };
            let listed: Vec<String> = candidates.iter().map(|p| return format!("'{p}'")).collect();
            diagnostics.info(
                Category::MultipleParents,
                Some(docname.as_str()),
                format!(
                    "document is referenced in multiple toctrees: [{}], selecting: {selected} <- {docname}",
                    listed.join(", ")
                ),
            );
        }

        for domain in self.domains.iter() {
            domain.check_consistency(diagnostics);
        }
        self.events.env_check_consistency(self, diagnostics);
        return;
    }

    /// Forget everything about `docname`: its record, navigation includes,
    /// assets, cached trees, and every domain's data for it.
    pub fn clear_doc(&mut self, docname: &str) {
        self.records.remove(docname);
        self.toctree_includes.remove(docname);
        self.assets.clear_doc(docname);
        self.domains.clear_doc(docname);
        self.doctree_cache.remove(docname);
        self.write_cache.remove(docname);
        return;
    }

    /// Pre-order walk of the inclusion graph from the root document producing
    /// parent, previous and next for every visited docname. Each docname is
    /// visited once; a document listing itself is reported and not followed.
    pub fn collect_relations(&self, diagnostics: &mut Diagnostics) -> BTreeMap<String, Relation> {
        let mut order: Vec<(Option<&str>, &str)> = Vec::new();
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut stack: Vec<(Option<&str>, &str)> = vec![(None, self.config.root_doc.as_str())];

        while let Some((parent, docname)) = stack.pop() {
            if parent == Some(docname) {
                diagnostics.warn(
                    Category::CircularToc,
                    Some(docname),
                    "self referenced toctree found. Ignored.".to_string(),
                );
                continue;
            }
            if !visited.insert(docname) {
                continue;
            }
            order.push((parent, docname));
            for child in self.toctree_includes(docname).iter().rev() {
                stack.push((Some(docname), child.as_str()));
            }
        }

        let mut relations = BTreeMap::new();
        for (position, (parent, docname)) in order.iter().enumerate() {
            let previous = position
                .checked_sub(1)
                .and_then(|p| return order.get(p))
                .map(|(_, d)| return (*d).to_string());
            let next = order.get(position.saturating_add(1)).map(|(_, d)| return (*d).to_string());
            relations.insert((*docname).to_string(), Relation {
                next,
                parent: parent.map(str::to_string),
                previous,
            });
        }
        return relations;
    }

    /// Configuration of the current run.
    pub const fn config(&self) -> &Config {
        return &self.config;
    }

    /// How the current configuration relates to the persisted one.
    pub const fn config_status(&self) -> &ConfigStatus {
        return &self.config_status;
    }

    /// Map a docname to its source file.
    pub fn doc2path(&self, docname: &str, absolute: bool) -> PathBuf {
        return self.project.doc2path(docname, absolute);
    }

    /// Docnames that have been read successfully at least once.
    pub fn docnames(&self) -> impl Iterator<Item = &String> {
        return self.known().map(|(d, _)| return d);
    }

    /// Path of the parsed-tree artifact for `docname`.
    pub fn doctree_path(&self, docname: &str) -> PathBuf {
        return self.artifacts_dir().join(format!("{docname}{DOCTREE_SUFFIX}"));
    }

    /// Discover the document set under the source root.
    ///
    /// # Errors
    ///
    /// Returns `Error::DiscoveryFailed` naming the root when the walk fails.
    pub fn find_files(&mut self) -> Result<BTreeSet<String>, Error> {
        let found = self.project.discover(&self.config)?.clone();
        tracing::debug!(count = found.len(), root = %self.project.source_root().display(), "discovered documents");
        return Ok(found);
    }

    /// Record the read time of the document currently being read and drop the scratch context.
    pub fn finish_read(&mut self) {
        let docname = std::mem::take(&mut self.scratch.docname);
        let started = self.scratch.reading_started_at;
        self.note_read(&docname, started);
        self.scratch = ScratchContext::default();
        return;
    }

    /// Docnames found by the last discovery.
    pub const fn found_docs(&self) -> &BTreeSet<String> {
        return self.project.docnames();
    }

    /// Tree for `docname` with post-transforms applied and every navigation
    /// placeholder expanded (or removed when nothing survives). A tree kept from
    /// this run's read phase is consumed; otherwise the artifact is loaded.
    ///
    /// # Errors
    ///
    /// Returns `Error::DoctreeNotFound` when no tree exists, or a pass failure.
    pub fn get_and_resolve_doctree(
        &mut self,
        docname: &str,
        renderer: &Renderer,
        options: &TocTreeOptions,
        diagnostics: &mut Diagnostics,
    ) -> Result<Element, Error> {
        let mut tree = match self.write_cache.remove(docname) {
            Some(tree) => tree,
            None => self.get_doctree(docname)?,
        };
        self.apply_post_transforms(&mut tree, docname, renderer, diagnostics)?;

        let navigation = Arc::clone(&self.navigation);
        let inventory: &Self = self;
        tree::replace_matching(&mut tree, &|n: &Node| return n.is_tag(tag::TOCTREE), &mut |n: Node| {
            return match n {
                Node::Element(placeholder) => navigation
                    .resolve(inventory, docname, &placeholder, options, renderer, diagnostics)
                    .map(Node::Element)
                    .into_iter()
                    .collect(),
                other @ (Node::PendingXref(_) | Node::Text { .. }) => vec![other],
            };
        });
        return Ok(tree);
    }

    /// Domain registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownDomain` when no domain has that name.
    pub fn get_domain(&self, name: &str) -> Result<&dyn Domain, Error> {
        return self.domains.get(name);
    }

    /// Load the parsed tree of `docname` from its artifact, through the byte cache.
    ///
    /// # Errors
    ///
    /// Returns `Error::DoctreeNotFound` if the artifact is missing, `Error::Io`
    /// for other read failures, or `Error::Json` if it cannot be decoded.
    pub fn get_doctree(&mut self, docname: &str) -> Result<Element, Error> {
        let path = self.doctree_path(docname);
        let bytes = match self.doctree_cache.entry(docname.to_string()) {
            Entry::Occupied(cached) => cached.into_mut(),
            Entry::Vacant(slot) => {
                let bytes = match std::fs::read(&path) {
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        return Err(Error::DoctreeNotFound {
                            docname: docname.to_string(),
                            path,
                        });
                    },
                    Err(e) => return Err(Error::Io(e)),
                    Ok(b) => b,
                };
                slot.insert(bytes)
            },
        };
        return Ok(serde_json::from_slice(bytes)?);
    }

    /// Decide which discovered documents need reading. Known documents no longer
    /// discovered are `removed`. A rebuild-forcing configuration change marks
    /// every discovered document as added; otherwise each known document goes
    /// through the per-document staleness checks.
    pub fn get_outdated_files(&self) -> OutdatedFiles {
        let found = self.project.docnames();
        let removed: BTreeSet<String> = self.docnames().filter(|d| return !found.contains(*d)).cloned().collect();

        if self.config_status.forces_rebuild() {
            tracing::info!(reason = %self.config_status.reason(), "rebuilding every document");
            return OutdatedFiles {
                added: found.clone(),
                changed: BTreeSet::new(),
                removed,
            };
        }

        let mut added = BTreeSet::new();
        let mut changed = BTreeSet::new();
        for docname in found {
            let Some(record) = self.record(docname) else {
                added.insert(docname.clone());
                continue;
            };
            let source = self.project.doc2path(docname, true);
            if let Some(reason) = has_doc_changed(record, &source, &self.doctree_path(docname)) {
                tracing::debug!(docname = %docname, %reason, "outdated");
                changed.insert(docname.clone());
            }
        }
        tracing::info!(added = added.len(), changed = changed.len(), removed = removed.len(), "outdated files");
        return OutdatedFiles { added, changed, removed };
    }

    /// Restore the persisted state for `source_root`, or start empty when none exists.
    ///
    /// # Errors
    ///
    /// Returns the fatal snapshot errors of [`Inventory::restore`], or read/decode errors.
    pub fn load(source_root: &Path, config: Config, domains: DomainRegistry) -> Result<Self, Error> {
        let mut inventory = Self::new(source_root, config, domains)?;
        let path = inventory.artifacts_dir().join(SNAPSHOT_FILE);
        if let Some(snapshot) = InventorySnapshot::read(&path)? {
            inventory.restore(snapshot)?;
        }
        return Ok(inventory);
    }

    /// Fold the records of `docnames` read by a worker copy into this inventory.
    /// Domain data for the same docnames is merged by the registry, then the
    /// `env-merge-info` listeners run.
    ///
    /// # Errors
    ///
    /// Propagates domain merge failures.
    pub fn merge_info_from(&mut self, docnames: &BTreeSet<String>, other: &Inventory) -> Result<(), Error> {
        for docname in docnames {
            if let Some(record) = other.records.get(docname) {
                self.records.insert(docname.clone(), record.clone());
            }
            if let Some(includes) = other.toctree_includes.get(docname) {
                self.toctree_includes.insert(docname.clone(), includes.clone());
            }
            if let Some(tree) = other.write_cache.get(docname) {
                self.write_cache.insert(docname.clone(), tree.clone());
            }
        }
        self.assets.merge(docnames, &other.assets);
        self.domains.merge_from(docnames, &other.domains)?;

        let events = self.events.clone();
        events.env_merge_info(self, docnames, other);
        return Ok(());
    }

    /// An empty inventory for `source_root`. Every discovered document counts as
    /// added until a snapshot is restored.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the configuration cannot be fingerprinted.
    pub fn new(source_root: &Path, config: Config, domains: DomainRegistry) -> Result<Self, Error> {
        let fingerprint = config.fingerprint()?;
        let project = Project::new(source_root, &config);
        let tags = Tags::new(&config.tags);
        return Ok(Self {
            assets: AssetRegistry::default(),
            config,
            config_status: ConfigStatus::New,
            doctree_cache: BTreeMap::new(),
            domains,
            events: EventManager::default(),
            fingerprint,
            navigation: Arc::new(TocTreeResolver),
            pipeline: Pipeline::default(),
            project,
            records: BTreeMap::new(),
            scratch: ScratchContext::default(),
            tags,
            toctree_includes: BTreeMap::new(),
            versioning: None,
            versioning_compare: false,
            write_cache: BTreeMap::new(),
        });
    }

    /// Next serial number for `category` within the current document.
    pub fn new_serialno(&mut self, category: &str) -> u64 {
        return self.scratch.new_serial_number(category);
    }

    /// Add an external file to the dependencies of `docname` (default: the
    /// document being read). Relative paths are taken from the source root.
    pub fn note_dependency(&mut self, path: &Path, docname: Option<&str>) {
        let absolute = normalize_path(&self.project.source_root().join(path));
        let docname = docname.unwrap_or(&self.scratch.docname).to_string();
        self.records.entry(docname).or_default().dependencies.insert(absolute);
        return;
    }

    /// Record that the current document pulls in the document stored at `path`,
    /// which exempts that document from the not-included warning.
    pub fn note_included(&mut self, path: &Path) {
        let Some(included) = self.project.path2doc(path) else {
            return;
        };
        let docname = self.scratch.docname.clone();
        self.records.entry(docname).or_default().includes.insert(included);
        return;
    }

    /// Record a successful read of `docname` at `at` (microseconds since the epoch).
    pub fn note_read(&mut self, docname: &str, at: i64) {
        self.records.entry(docname.to_string()).or_default().read_at = Some(at);
        return;
    }

    /// Re-read the current document on the next run, whatever its timestamps say.
    pub fn note_reread(&mut self) {
        let docname = self.scratch.docname.clone();
        self.records.entry(docname).or_default().reread = true;
        return;
    }

    /// Map a source file to its docname.
    pub fn path2doc(&self, path: &Path) -> Option<String> {
        return self.project.path2doc(path);
    }

    /// Persist the snapshot to the artifacts directory and return its path.
    ///
    /// # Errors
    ///
    /// Returns export, serialization or write failures.
    pub fn persist(&self) -> Result<PathBuf, Error> {
        let path = self.artifacts_dir().join(SNAPSHOT_FILE);
        self.snapshot()?.write(&path)?;
        tracing::debug!(path = %path.display(), "inventory persisted");
        return Ok(path);
    }

    /// Mutable access to the post-transform pipeline, to register passes.
    pub const fn pipeline_mut(&mut self) -> &mut Pipeline {
        return &mut self.pipeline;
    }

    /// Start reading `docname`: a fresh scratch context with the configured
    /// default role, and the primary domain as default when it is registered.
    pub fn prepare_settings(&mut self, docname: &str) {
        let default_domain = self
            .domains
            .contains(&self.config.primary_domain)
            .then(|| return self.config.primary_domain.clone());
        self.scratch = ScratchContext::new(docname, &self.config.default_role, default_domain);
        self.scratch.reading_started_at = now_micros();
        return;
    }

    /// Read one document through `parser`: parse it, record its title, metadata,
    /// section toc and navigation includes, let the domains process it, and
    /// write its parsed-tree artifact. The read time is the time reading started.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownDocument` if the source is missing, the parser's
    /// error, or artifact write failures.
    pub fn read_doc(&mut self, docname: &str, parser: &dyn MarkupParser) -> Result<(), Error> {
        self.clear_doc(docname);
        self.prepare_settings(docname);
        self.scratch.parser = Some(parser.name().to_string());

        let source_path = self.project.doc2path(docname, true);
        let source = std::fs::read_to_string(&source_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Error::UnknownDocument {
                    docname: docname.to_string(),
                };
            }
            return Error::Io(e);
        })?;
        let parsed = match parser.parse(docname, &source, self) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.scratch = ScratchContext::default();
                return Err(e);
            },
        };

        let mut includes: Vec<String> = Vec::new();
        for placeholder in tree::find_elements(&parsed.tree, &|el| return el.tag == tag::TOCTREE) {
            for child in toctree::included_docnames(placeholder, docname) {
                if !includes.contains(&child) {
                    includes.push(child);
                }
            }
        }
        if !includes.is_empty() {
            self.toctree_includes.insert(docname.to_string(), includes);
        }

        let record = self.records.entry(docname.to_string()).or_default();
        record.metadata = parsed.metadata;
        record.title = reader::first_title(&parsed.tree);
        record.toc = reader::section_toc(&parsed.tree);
        self.domains.process_doc(docname, &parsed.tree);

        let artifact = self.doctree_path(docname);
        if let Some(parent) = artifact.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&artifact, serde_json::to_vec(&parsed.tree)?)?;
        self.write_cache.insert(docname.to_string(), parsed.tree);

        self.finish_read();
        tracing::debug!(docname, "read");
        return Ok(());
    }

    /// Record of a document that has been read at least once.
    pub fn record(&self, docname: &str) -> Option<&DocumentRecord> {
        return self.records.get(docname).filter(|r| return r.read_at.is_some());
    }

    /// Resolve a file referenced from `docname`; see [`Project::relfn2path`].
    pub fn relfn2path(&self, filename: &str, docname: Option<&str>) -> (String, PathBuf) {
        return self.project.relfn2path(filename, docname);
    }

    /// Adopt a persisted snapshot. The snapshot must have been written for the
    /// same version stamp and source root; any mismatch is fatal. Both tree
    /// caches are emptied and the configuration change is classified.
    ///
    /// # Errors
    ///
    /// Returns `Error::VersionMismatch`, `Error::SourceRootChanged`, or a domain import failure.
    pub fn restore(&mut self, snapshot: InventorySnapshot) -> Result<(), Error> {
        snapshot.validate(&self.version_stamp(), self.project.source_root())?;
        self.domains.import_all(&snapshot.domain_data)?;
        self.config_status = classify_config_change(snapshot.config.as_ref(), &self.fingerprint, self.config.verbosity);
        if self.config_status.forces_rebuild() {
            tracing::info!(reason = %self.config_status.reason(), "configuration changed");
        }
        self.assets = snapshot.assets;
        self.records = snapshot.documents;
        self.toctree_includes = snapshot.toctree_includes;
        self.versioning = snapshot.versioning;
        self.doctree_cache.clear();
        self.write_cache.clear();
        return Ok(());
    }

    /// Replace the navigation resolver.
    pub fn set_navigation_resolver(&mut self, resolver: Arc<dyn NavigationResolver>) {
        self.navigation = resolver;
        return;
    }

    /// Store the section and figure numbers a numbering collector computed for
    /// `docname`. Returns whether they differ from the recorded ones; unknown
    /// documents are ignored.
    pub fn set_numbering(
        &mut self,
        docname: &str,
        secnumbers: BTreeMap<String, Vec<u32>>,
        fignumbers: BTreeMap<String, BTreeMap<String, Vec<u32>>>,
    ) -> bool {
        let Some(record) = self.records.get_mut(docname).filter(|r| return r.read_at.is_some()) else {
            return false;
        };
        if record.secnumbers == secnumbers && record.fignumbers == fignumbers {
            return false;
        }
        record.fignumbers = fignumbers;
        record.secnumbers = secnumbers;
        tracing::debug!(docname, "numbering updated");
        return true;
    }

    /// Select the doctree versioning method by name.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidVersioningMethod` for an unknown name, or
    /// `Error::IncompatibleVersioning` when another method was applied before.
    pub fn set_versioning_method(&mut self, name: &str, compare: bool) -> Result<(), Error> {
        let method = VersioningMethod::from_name(name).ok_or_else(|| {
            return Error::InvalidVersioningMethod {
                method: name.to_string(),
            };
        })?;
        if let Some(current) = self.versioning {
            if current != method {
                return Err(Error::IncompatibleVersioning {
                    current: current.name().to_string(),
                    requested: method.name().to_string(),
                });
            }
        }
        self.versioning = Some(method);
        self.versioning_compare = compare;
        return Ok(());
    }

    /// The persistable state of this inventory.
    ///
    /// # Errors
    ///
    /// Propagates domain export failures.
    pub fn snapshot(&self) -> Result<InventorySnapshot, Error> {
        return Ok(InventorySnapshot {
            assets: self.assets.clone(),
            config: Some(self.fingerprint.clone()),
            documents: self.records.clone(),
            domain_data: self.domains.export_all()?,
            schema: SNAPSHOT_SCHEMA,
            source_root: self.project.source_root().to_path_buf(),
            toctree_includes: self.toctree_includes.clone(),
            version: self.version_stamp(),
            versioning: self.versioning,
        });
    }

    /// Source root directory.
    pub fn source_root(&self) -> &Path {
        return self.project.source_root();
    }

    /// Active build tags.
    pub const fn tags(&self) -> &Tags {
        return &self.tags;
    }

    /// Docnames included by `docname`'s navigation placeholders, in order.
    pub fn toctree_includes(&self, docname: &str) -> &[String] {
        return self.toctree_includes.get(docname).map(Vec::as_slice).unwrap_or_default();
    }

    /// Version stamp of this run: core schema plus every registered domain.
    pub fn version_stamp(&self) -> VersionStamp {
        return VersionStamp::new(self.domains.versions());
    }

    /// Versioning method and compare flag, if a method was selected.
    pub fn versioning(&self) -> Option<(VersioningMethod, bool)> {
        return self.versioning.map(|m| return (m, self.versioning_compare));
    }

    /// Records of documents read at least once.
    fn known(&self) -> impl Iterator<Item = (&String, &DocumentRecord)> {
        return self.records.iter().filter(|(_, r)| return r.read_at.is_some());
    }
}
