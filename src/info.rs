//! `doctrack info`: a reference sheet plus a summary of the persisted inventory.

use std::path::Path;

use serde::Serialize;

use crate::config::{CONFIG_FILE, Config};
use crate::domains::DomainRegistry;
use crate::snapshot::{InventorySnapshot, SNAPSHOT_FILE, VersionStamp};
use crate::transforms::Pipeline;

/// Exit codes shared by every command.
const EXIT_CODES: &[(u8, &str)] = &[
    (0, "Success / inventory consistent"),
    (1, "Consistency warnings reported"),
    (3, "Runtime error"),
];

/// Output the reference document for `root`, as markdown or JSON.
pub fn run(root: &Path, json: bool) {
    let state = gather_state(root);

    if json {
        print_json(&state);
    } else {
        print_markdown(&state);
    }
    return;
}

// ── State gathering ───────────────────────────────────────────────────

/// What is on disk for the project.
struct CurrentState {
    /// Whether `doctrack.toml` exists.
    config_found: bool,
    /// Number of documents in the snapshot, if one could be read.
    documents: Option<usize>,
    /// Registered domains with their data versions.
    domains: Vec<(String, u32)>,
    /// Post-transform names in execution order.
    passes: Vec<&'static str>,
    /// Root docname from the configuration.
    root_doc: String,
    /// Version stamp of this build of doctrack.
    version_stamp: String,
}

/// Inspect the project without modifying it. Unreadable files are reported as absent.
fn gather_state(root: &Path) -> CurrentState {
    let config_found = root.join(CONFIG_FILE).is_file();
    let config = Config::load(root).unwrap_or_default();
    let snapshot_path = config.artifacts_path(root).join(SNAPSHOT_FILE);
    let documents = InventorySnapshot::read(&snapshot_path)
        .ok()
        .flatten()
        .map(|s| return s.documents.len());
    let domains = DomainRegistry::with_standard().versions();
    let version_stamp = VersionStamp::new(domains.iter().cloned()).to_string();

    return CurrentState {
        config_found,
        documents,
        domains,
        passes: Pipeline::default().names(),
        root_doc: config.root_doc,
        version_stamp,
    };
}

// ── Markdown output ───────────────────────────────────────────────────

/// Print the whole reference sheet as markdown.
fn print_markdown(state: &CurrentState) {
    let version = env!("CARGO_PKG_VERSION");
    print_markdown_header(version);
    print_markdown_state(state);
    println!();
    print_markdown_exit_codes();
    return;
}

/// Static part: syntax, workflow, configuration.
fn print_markdown_header(version: &str) {
    print!(
        "\
# doctrack {version}

Incremental document inventory: decides which documents must be re-read,
tracks navigation trees, and resolves cross-references.

## Markup

    # Title / ## Section                  sections (`(label)=` on the line before labels one)
    :orphan:                              metadata before the first heading
    {{ref}}`label`  {{doc}}`path`  {{any}}`x`  cross-references (`Title <target>` for explicit text)
    ```{{toctree}} ... ```                navigation tree (`:maxdepth:`, `:hidden:`, `:caption:`)
    ```{{only}} html and not draft ... ```  build-tag conditional

## Workflow

    doctrack status                   Show added / changed / removed documents
    doctrack check                    Refresh and check consistency (exit 0/1)
    doctrack relations                Refresh and print parent / prev / next
    doctrack resolve <docname>        Refresh and print the resolved tree as JSON

## Configuration (doctrack.toml)

    root_doc = \"index\"
    source_suffix = \".md\"
    include = [\"docs/\"]                 # only scan these paths
    exclude = [\"docs/archive/\"]         # skip these paths
    nitpicky = true                     # warn about every unresolved reference
    tags = [\"html\"]                     # active build tags

## Current State

"
    );
    return;
}

/// Dynamic part: what was found on disk.
fn print_markdown_state(state: &CurrentState) {
    if state.config_found {
        println!("Config:     {CONFIG_FILE} (found)");
    } else {
        println!("Config:     {CONFIG_FILE} (not found, defaults)");
    }
    println!("Root:       {}", state.root_doc);

    match state.documents {
        Some(n) => println!("Inventory:  {SNAPSHOT_FILE} ({n} documents)"),
        None => println!("Inventory:  {SNAPSHOT_FILE} (not found)"),
    }

    let domains = state
        .domains
        .iter()
        .map(|(name, version)| return format!("{name} (v{version})"))
        .collect::<Vec<_>>()
        .join(", ");
    println!("Domains:    {domains}");
    println!("Passes:     {}", state.passes.join(", "));
    println!("Stamp:      {}", state.version_stamp);
    return;
}

/// Exit code table.
fn print_markdown_exit_codes() {
    println!("## Exit Codes");
    println!();
    println!("| Code | Meaning |");
    println!("|------|---------|");
    for (code, meaning) in EXIT_CODES {
        println!("| {code}    | {meaning} |");
    }
    return;
}

// ── JSON output ───────────────────────────────────────────────────────

/// Top-level JSON document.
#[derive(Serialize)]
struct InfoJson {
    /// Current state of the project.
    current_state: StateJson,
    /// Exit code table.
    exit_codes: Vec<ExitCodeInfo>,
    /// Crate version.
    version: String,
}

/// One exit code.
#[derive(Serialize)]
struct ExitCodeInfo {
    /// Numeric code.
    code: u8,
    /// What it means.
    meaning: String,
}

/// Project state.
#[derive(Serialize)]
struct StateJson {
    /// Whether a configuration file exists.
    config_found: bool,
    /// Documents in the persisted inventory.
    documents: Option<usize>,
    /// Domain name and data version.
    domains: Vec<DomainJson>,
    /// Post-transform names in order.
    passes: Vec<String>,
    /// Root docname.
    root_doc: String,
    /// Version stamp.
    version_stamp: String,
}

/// One registered domain.
#[derive(Serialize)]
struct DomainJson {
    /// Domain name.
    name: String,
    /// Data schema version.
    version: u32,
}

/// Print the JSON form.
fn print_json(state: &CurrentState) {
    let info = InfoJson {
        current_state: StateJson {
            config_found: state.config_found,
            documents: state.documents,
            domains: state
                .domains
                .iter()
                .map(|(name, version)| {
                    return DomainJson {
                        name: name.clone(),
                        version: *version,
                    };
                })
                .collect(),
            passes: state.passes.iter().map(|p| return (*p).to_string()).collect(),
            root_doc: state.root_doc.clone(),
            version_stamp: state.version_stamp.clone(),
        },
        exit_codes: EXIT_CODES
            .iter()
            .map(|(code, meaning)| {
                return ExitCodeInfo {
                    code: *code,
                    meaning: (*meaning).to_string(),
                };
            })
            .collect(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    // Plain structs with string keys always serialize.
    let json = serde_json::to_string_pretty(&info).unwrap_or_default();
    println!("{json}");
    return;
}
