//! Per-document staleness checks against the recorded read time.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::DocumentRecord;

/// Why a known document must be reprocessed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// A dependency no longer exists.
    DependencyMissing(String),
    /// A dependency was modified after the document was read.
    DependencyNewer(String),
    /// A dependency's modification time could not be read.
    DependencyUnreadable(String),
    /// There is no parsed-tree artifact on disk.
    DoctreeMissing,
    /// The document was flagged for an unconditional re-read.
    Reread,
    /// The source file was modified after the document was read.
    SourceNewer,
    /// The source file's modification time could not be read.
    SourceUnreadable,
}

impl std::fmt::Display for StaleReason {
    /// Short description used in debug logging.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return match self {
            StaleReason::DependencyMissing(dep) => write!(f, "dependency {dep} does not exist"),
            StaleReason::DependencyNewer(dep) => write!(f, "dependency {dep} is newer"),
            StaleReason::DependencyUnreadable(dep) => write!(f, "dependency {dep} could not be checked"),
            StaleReason::DoctreeMissing => write!(f, "doctree file does not exist"),
            StaleReason::Reread => write!(f, "flagged for re-read"),
            StaleReason::SourceNewer => write!(f, "source file is newer"),
            StaleReason::SourceUnreadable => write!(f, "source file could not be checked"),
        };
    }
}

/// Decide whether a known document is stale. The checks run in a fixed order
/// and the first match wins: forced re-read, missing artifact, newer source,
/// then each dependency (missing, unreadable, or newer).
///
/// Filesystem errors never propagate; they count as stale.
pub fn has_doc_changed(
    record: &DocumentRecord,
    source: &Path,
    artifact: &Path,
) -> Option<StaleReason> {
    if record.reread {
        return Some(StaleReason::Reread);
    }
    if !artifact.is_file() {
        return Some(StaleReason::DoctreeMissing);
    }
    let read_at = record.read_at.unwrap_or(0);

    match last_modified_micros(source) {
        Err(_) => return Some(StaleReason::SourceUnreadable),
        Ok(mtime) if mtime > read_at => return Some(StaleReason::SourceNewer),
        Ok(_) => {},
    }

    for dep in &record.dependencies {
        let label = dep.display().to_string();
        if !dep.exists() {
            return Some(StaleReason::DependencyMissing(label));
        }
        match last_modified_micros(dep) {
            Err(_) => return Some(StaleReason::DependencyUnreadable(label)),
            Ok(mtime) if mtime > read_at => return Some(StaleReason::DependencyNewer(label)),
            Ok(_) => {},
        }
    }

    return None;
}

/// Modification time of `path` in microseconds since the epoch.
///
/// # Errors
///
/// Returns the underlying I/O error if metadata cannot be read.
pub fn last_modified_micros(path: &Path) -> std::io::Result<i64> {
    let modified = std::fs::metadata(path)?.modified()?;
    return Ok(micros_since_epoch(modified));
}

/// Convert a system time to microseconds since the epoch (clamped at zero and `i64::MAX`).
pub fn micros_since_epoch(time: SystemTime) -> i64 {
    let micros = time.duration_since(UNIX_EPOCH).map_or(0, |d| return d.as_micros());
    return i64::try_from(micros).unwrap_or(i64::MAX);
}

/// Current time in microseconds since the epoch.
pub fn now_micros() -> i64 {
    return micros_since_epoch(SystemTime::now());
}
