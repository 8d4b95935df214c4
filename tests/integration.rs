use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use std::time::{Duration, SystemTime};

use doctrack::config::Config;
use doctrack::domains::DomainRegistry;
use doctrack::parallel::read_parallel;
use doctrack::reader::LineMarkup;
use doctrack::Inventory;
use filetime::FileTime;
use tempfile::TempDir;
use test_log::test;

/// Copy `tests/fixtures/<name>` into a fresh temporary directory.
fn fixture(name: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    let source = Path::new("tests/fixtures").join(name);
    for entry in walkdir::WalkDir::new(&source) {
        let entry = entry.unwrap();
        let relative = entry.path().strip_prefix(&source).unwrap();
        let target = dir.path().join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).unwrap();
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
    backdate(dir.path());
    dir
}

/// Push every file's mtime an hour into the past, so a read started now is strictly newer.
fn backdate(root: &Path) {
    let past = FileTime::from_system_time(SystemTime::now() - Duration::from_secs(3600));
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry.unwrap();
        if entry.file_type().is_file() {
            filetime::set_file_mtime(entry.path(), past).unwrap();
        }
    }
}

fn touch_future(path: &Path) {
    let future = FileTime::from_system_time(SystemTime::now() + Duration::from_secs(3600));
    filetime::set_file_mtime(path, future).unwrap();
}

fn load(root: &Path) -> Inventory {
    let config = Config::load(root).unwrap();
    Inventory::load(root, config, DomainRegistry::with_standard()).unwrap()
}

/// Discover, read everything outdated, persist. Mirrors what the CLI does.
fn build(root: &Path) -> Inventory {
    let mut inventory = load(root);
    inventory.find_files().unwrap();
    let outdated = inventory.get_outdated_files();
    for docname in &outdated.removed {
        inventory.clear_doc(docname);
    }
    let to_read: BTreeSet<String> = outdated.added.union(&outdated.changed).cloned().collect();
    read_parallel(&mut inventory, &to_read, 2, &LineMarkup).unwrap();
    inventory.persist().unwrap();
    inventory
}

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ── Incremental state ───────────────────────────────────────────────

#[test]
fn unchanged_project_has_nothing_outdated() {
    let dir = fixture("site");
    build(dir.path());

    let mut inventory = load(dir.path());
    inventory.find_files().unwrap();
    let outdated = inventory.get_outdated_files();
    assert!(outdated.added.is_empty());
    assert!(outdated.changed.is_empty());
    assert!(outdated.removed.is_empty());
}

#[test]
fn touched_source_is_changed() {
    let dir = fixture("site");
    build(dir.path());
    touch_future(&dir.path().join("guide/install.md"));

    let mut inventory = load(dir.path());
    inventory.find_files().unwrap();
    let outdated = inventory.get_outdated_files();
    assert!(outdated.added.is_empty());
    assert_eq!(outdated.changed, names(&["guide/install"]));
    assert!(outdated.removed.is_empty());
}

#[test]
fn deleted_source_is_removed() {
    let dir = fixture("site");
    build(dir.path());
    fs::remove_file(dir.path().join("guide/usage.md")).unwrap();

    let mut inventory = load(dir.path());
    inventory.find_files().unwrap();
    let outdated = inventory.get_outdated_files();
    assert_eq!(outdated.removed, names(&["guide/usage"]));
    assert!(outdated.changed.is_empty());
}

#[test]
fn rebuild_forcing_config_change_marks_everything_added() {
    let dir = fixture("site");
    build(dir.path());
    fs::write(
        dir.path().join("doctrack.toml"),
        "root_doc = \"index\"\ntags = [\"html\"]\ndefault_role = \"any\"\n",
    )
    .unwrap();

    let mut inventory = load(dir.path());
    assert!(inventory.config_status().forces_rebuild());
    inventory.find_files().unwrap();
    let outdated = inventory.get_outdated_files();
    assert_eq!(outdated.added, names(&["guide/install", "guide/usage", "index"]));
    assert!(outdated.changed.is_empty());
}

#[test]
fn output_only_config_change_keeps_documents_fresh() {
    let dir = fixture("site");
    build(dir.path());
    fs::write(
        dir.path().join("doctrack.toml"),
        "root_doc = \"index\"\ntags = [\"html\"]\nnitpicky = true\n",
    )
    .unwrap();

    let mut inventory = load(dir.path());
    assert!(!inventory.config_status().forces_rebuild());
    inventory.find_files().unwrap();
    let outdated = inventory.get_outdated_files();
    assert!(outdated.added.is_empty());
    assert!(outdated.changed.is_empty());
}

#[test]
fn snapshot_round_trip_preserves_records() {
    let dir = fixture("site");
    let built = build(dir.path());
    let restored = load(dir.path());

    let before: Vec<&String> = built.docnames().collect();
    let after: Vec<&String> = restored.docnames().collect();
    assert_eq!(before, after);
    for docname in before {
        assert_eq!(built.record(docname), restored.record(docname));
    }
    assert_eq!(restored.toctree_includes("index"), ["guide/install", "guide/usage"]);
}

#[test]
fn relations_follow_navigation_order() {
    let dir = fixture("site");
    let inventory = build(dir.path());
    let mut diagnostics = doctrack::diagnostics::Diagnostics::default();
    let table = inventory.collect_relations(&mut diagnostics);

    let install = table.get("guide/install").unwrap();
    assert_eq!(install.parent.as_deref(), Some("index"));
    assert_eq!(install.previous.as_deref(), Some("index"));
    assert_eq!(install.next.as_deref(), Some("guide/usage"));
    assert_eq!(diagnostics.warning_count(), 0);
}

// ── CLI ─────────────────────────────────────────────────────────────

fn doctrack(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_doctrack"))
        .arg("--root")
        .arg(root)
        .args(args)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn status_on_fresh_project_lists_every_document_as_added() {
    let dir = fixture("site");
    let output = doctrack(dir.path(), &["status"]);
    assert!(output.status.success(), "status failed: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("3 added, 0 changed, 0 removed"));
}

#[test]
fn check_then_status_reports_nothing_outdated() {
    let dir = fixture("site");
    let check = doctrack(dir.path(), &["check"]);
    assert!(check.status.success(), "check failed: {}", stdout(&check));
    assert!(stdout(&check).contains("All 3 documents consistent"));

    let status = doctrack(dir.path(), &["status"]);
    assert!(stdout(&status).contains("0 added, 0 changed, 0 removed"));
}

#[test]
fn check_fails_for_unreachable_document() {
    let dir = fixture("site");
    fs::write(dir.path().join("stray.md"), "# Stray\n").unwrap();
    let output = doctrack(dir.path(), &["check"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("stray"));
}

#[test]
fn orphan_document_is_not_reported() {
    let dir = fixture("site");
    fs::write(dir.path().join("stray.md"), ":orphan:\n# Stray\n").unwrap();
    let output = doctrack(dir.path(), &["check"]);
    assert!(output.status.success(), "check failed: {}", stdout(&output));
}

#[test]
fn resolve_prints_resolved_tree() {
    let dir = fixture("site");
    let output = doctrack(dir.path(), &["-j", "2", "resolve", "index"]);
    assert!(output.status.success(), "resolve failed: {}", String::from_utf8_lossy(&output.stderr));
    let text = stdout(&output);
    let tree: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert!(tree.is_object());
    assert!(text.contains("\"reference\""));
    assert!(!text.contains("pending_xref"));
}

#[test]
fn resolve_unknown_document_is_runtime_error() {
    let dir = fixture("site");
    let output = doctrack(dir.path(), &["resolve", "nowhere"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn info_json_reports_inventory_size() {
    let dir = fixture("site");
    doctrack(dir.path(), &["check"]);
    let output = doctrack(dir.path(), &["info", "--json"]);
    assert!(output.status.success());
    let info: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(info["current_state"]["documents"], 3);
    assert_eq!(info["current_state"]["config_found"], true);
    assert_eq!(info["current_state"]["root_doc"], "index");
}
