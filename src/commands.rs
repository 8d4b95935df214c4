//! CLI commands for doctrack: status, check, relations, resolve.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::config::Config;
use crate::diagnostics::{Diagnostic, Diagnostics, Level};
use crate::domains::DomainRegistry;
use crate::error::Error;
use crate::inventory::Inventory;
use crate::parallel::read_parallel;
use crate::reader::LineMarkup;
use crate::toctree::TocTreeOptions;
use crate::transforms::Renderer;
use crate::types::OutdatedFiles;

/// Element kinds the built-in HTML renderer visits natively.
const HTML_VISITORS: &[&str] = &["desc_inline", "desc_sig_element"];

/// Bring the inventory up to date and run the consistency check.
/// Exit code 1 when any warning was reported.
///
/// # Errors
///
/// Returns configuration, snapshot, discovery, read or persistence errors.
pub fn check(root: &Path, jobs: usize) -> Result<ExitCode, Error> {
    let inventory = refresh(root, jobs)?;
    let mut diagnostics = Diagnostics::default();
    inventory.collect_relations(&mut diagnostics);
    inventory.check_consistency(&mut diagnostics);
    print_diagnostics(diagnostics.entries());

    let total = inventory.docnames().count();
    let warnings = diagnostics.warning_count();
    if warnings > 0 {
        println!();
        println!("{warnings} warning(s) in {total} documents");
        return Ok(ExitCode::from(1));
    }
    println!("All {total} documents consistent");
    return Ok(ExitCode::SUCCESS);
}

/// Load the configuration and the persisted inventory for `root`.
///
/// # Errors
///
/// Returns `Error::Io` if the root cannot be resolved, configuration errors,
/// or the fatal snapshot errors.
pub fn open(root: &Path) -> Result<Inventory, Error> {
    let root = canonical_root(root)?;
    let config = Config::load(&root)?;
    return Inventory::load(&root, config, DomainRegistry::with_standard());
}

/// Print the parent/previous/next table of every document reachable from the root.
///
/// # Errors
///
/// Returns any error of the refresh step.
pub fn relations(root: &Path, jobs: usize) -> Result<(), Error> {
    let inventory = refresh(root, jobs)?;
    let mut diagnostics = Diagnostics::default();
    let table = inventory.collect_relations(&mut diagnostics);
    print_diagnostics(diagnostics.entries());
    for (docname, relation) in &table {
        println!(
            "{docname}\tparent={}\tprev={}\tnext={}",
            relation.parent.as_deref().unwrap_or("-"),
            relation.previous.as_deref().unwrap_or("-"),
            relation.next.as_deref().unwrap_or("-"),
        );
    }
    return Ok(());
}

/// Refresh the inventory, then print the fully resolved tree of `docname` as JSON.
/// Warnings go to stderr.
///
/// # Errors
///
/// Returns `Error::UnknownDocument` for a docname that was never read, any
/// refresh error, or a post-transform failure.
pub fn resolve(root: &Path, jobs: usize, docname: &str, builder: &str) -> Result<(), Error> {
    let mut inventory = refresh(root, jobs)?;
    if inventory.record(docname).is_none() {
        return Err(Error::UnknownDocument {
            docname: docname.to_string(),
        });
    }
    let renderer = Renderer::new(builder, "html", HTML_VISITORS);
    let options = TocTreeOptions {
        prune: true,
        tags: inventory.tags().clone(),
        ..TocTreeOptions::default()
    };
    let mut diagnostics = Diagnostics::default();
    let tree = inventory.get_and_resolve_doctree(docname, &renderer, &options, &mut diagnostics)?;
    for entry in diagnostics.entries() {
        eprintln!("{}", format_diagnostic(entry));
    }
    println!("{}", serde_json::to_string_pretty(&tree)?);
    return Ok(());
}

/// Print what a refresh would do, without reading anything.
///
/// # Errors
///
/// Returns configuration, snapshot or discovery errors.
pub fn status(root: &Path) -> Result<(), Error> {
    let mut inventory = open(root)?;
    inventory.find_files()?;
    let outdated = inventory.get_outdated_files();
    print_outdated(&outdated);
    return Ok(());
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Absolute form of the source root, so the recorded root is stable across invocations.
fn canonical_root(root: &Path) -> Result<PathBuf, Error> {
    return Ok(std::fs::canonicalize(root)?);
}

/// One diagnostic as a single line.
fn format_diagnostic(entry: &Diagnostic) -> String {
    let level = match entry.level {
        Level::Info => "INFO   ",
        Level::Warning => "WARNING",
    };
    return match &entry.location {
        Some(location) => format!("{level} {location}: {}", entry.message),
        None => format!("{level} {}", entry.message),
    };
}

/// Print diagnostics to stdout, one per line.
fn print_diagnostics(entries: &[Diagnostic]) {
    for entry in entries {
        println!("{}", format_diagnostic(entry));
    }
    return;
}

/// Print the added/changed/removed sets and a summary line.
fn print_outdated(outdated: &OutdatedFiles) {
    for docname in &outdated.added {
        println!("ADDED    {docname}");
    }
    for docname in &outdated.changed {
        println!("CHANGED  {docname}");
    }
    for docname in &outdated.removed {
        println!("REMOVED  {docname}");
    }
    println!(
        "{} added, {} changed, {} removed",
        outdated.added.len(),
        outdated.changed.len(),
        outdated.removed.len()
    );
    return;
}

/// Discover documents, forget removed ones, read outdated ones (and whatever
/// listeners report as dependent), and persist the snapshot.
///
/// # Errors
///
/// Returns configuration, snapshot, discovery, read or persistence errors.
fn refresh(root: &Path, jobs: usize) -> Result<Inventory, Error> {
    let mut inventory = open(root)?;
    inventory.find_files()?;
    let outdated = inventory.get_outdated_files();
    for docname in &outdated.removed {
        inventory.clear_doc(docname);
    }

    let mut to_read: BTreeSet<String> = outdated.added.union(&outdated.changed).cloned().collect();
    let dependents = inventory.check_dependents(&to_read);
    to_read.extend(dependents);
    if !to_read.is_empty() {
        tracing::info!(documents = to_read.len(), jobs, "reading sources");
    }
    read_parallel(&mut inventory, &to_read, jobs, &LineMarkup)?;
    inventory.persist()?;
    return Ok(inventory);
}
