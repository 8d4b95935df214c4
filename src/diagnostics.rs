//! User-visible diagnostics: collected warnings and markdown error rendering.

use std::fmt::Write as _;

use serde::Serialize;

use crate::error::Error;

/// ANSI bold, used for markdown headings on a terminal.
const BOLD: &str = "\x1b[1m";
/// ANSI reset.
const RESET: &str = "\x1b[0m";

/// What a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// More than one target matched a generic `any` reference.
    AmbiguousAny,
    /// A navigation tree includes its own document.
    CircularToc,
    /// A domain reported an inconsistency.
    DomainConsistency,
    /// Fallback text for an unresolved reference could not be determined.
    FallbackText,
    /// A document is included from several navigation trees (informational).
    MultipleParents,
    /// A known document is not reachable from the root navigation tree.
    NotIncluded,
    /// A visibility conditional could not be evaluated.
    OnlyExpression,
    /// A reference could not be resolved.
    RefMissing,
    /// A navigation tree refers to a document that cannot be used.
    Toc,
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Informational; never counts as a failure.
    Info,
    /// A warning the user should act on.
    Warning,
}

/// One recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// What the diagnostic is about.
    pub category: Category,
    /// Severity.
    pub level: Level,
    /// Docname (or other location) the diagnostic points at.
    pub location: Option<String>,
    /// Human-readable message.
    pub message: String,
}

/// Sink for non-fatal diagnostics. Everything recorded is also emitted through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    /// Recorded diagnostics in emission order.
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// All recorded diagnostics.
    pub fn entries(&self) -> &[Diagnostic] {
        return &self.entries;
    }

    /// Record an informational diagnostic.
    pub fn info(&mut self, category: Category, location: Option<&str>, message: String) {
        tracing::info!(location = location.unwrap_or(""), "{message}");
        self.entries.push(Diagnostic {
            category,
            level: Level::Info,
            location: location.map(str::to_string),
            message,
        });
        return;
    }

    /// Recorded diagnostics of one category.
    pub fn of(&self, category: Category) -> Vec<&Diagnostic> {
        return self.entries.iter().filter(|d| return d.category == category).collect();
    }

    /// Record a warning.
    pub fn warn(&mut self, category: Category, location: Option<&str>, message: String) {
        tracing::warn!(location = location.unwrap_or(""), "{message}");
        self.entries.push(Diagnostic {
            category,
            level: Level::Warning,
            location: location.map(str::to_string),
            message,
        });
        return;
    }

    /// Number of warning-level entries.
    pub fn warning_count(&self) -> usize {
        return self.entries.iter().filter(|d| return d.level == Level::Warning).count();
    }
}

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
    return;
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where there is one,
/// how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::DiscoveryFailed { root, reason } => format!(
            "\
# Error: Discovery Failed

Could not scan `{}` for documents: {reason}
",
            root.display()
        ),
        Error::DoctreeNotFound { docname, path } => format!(
            "\
# Error: Parsed Tree Missing

No parsed tree for `{docname}` at `{}`.

## Fix

Read the document again so its artifact is written.
",
            path.display()
        ),
        Error::IncompatibleVersioning { current, requested } => {
            render_incompatible_versioning(current, requested)
        },
        Error::SourceRootChanged { current, recorded } => format!(
            "\
# Error: Source Directory Changed

The inventory was recorded for `{}` but this run uses `{}`.

## Fix

Discard the artifacts directory and rebuild.
",
            recorded.display(),
            current.display()
        ),
        Error::UnknownDomain { name } => render_unknown_domain(name),
        Error::VersionMismatch { expected, found } => format!(
            "\
# Error: Inventory Version Not Current

Expected `{expected}`, found `{found}`.

## Fix

Discard the artifacts directory and rebuild.
"
        ),
        _ => render_generic(e),
    };
}

/// Markdown block for errors without a dedicated renderer.
fn render_generic(e: &Error) -> String {
    return format!(
        "\
# Error

{e}
"
    );
}

/// Markdown block for a versioning-method conflict.
fn render_incompatible_versioning(current: &str, requested: &str) -> String {
    let mut out = String::from("# Error: Incompatible Versioning Method\n\n");
    let _ = writeln!(
        out,
        "The inventory uses `{current}`, the selected renderer needs `{requested}`."
    );
    out.push_str("\n## Fix\n\nChoose another artifacts directory, or discard the current one.\n");
    return out;
}

/// Markdown block for an unregistered domain.
fn render_unknown_domain(name: &str) -> String {
    return format!(
        "\
# Error: Unknown Domain

Domain `{name}` is not registered.

## Fix

Register the domain before resolving, or fix the domain prefix of the reference.
"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_and_infos_are_counted_separately() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.warn(Category::NotIncluded, Some("a"), "not included".into());
        diagnostics.info(Category::MultipleParents, Some("b"), "two parents".into());
        assert_eq!(diagnostics.entries().len(), 2);
        assert_eq!(diagnostics.warning_count(), 1);
        assert_eq!(diagnostics.of(Category::MultipleParents).len(), 1);
    }

    #[test]
    fn renders_unknown_domain_with_fix() {
        let md = render_error(&Error::UnknownDomain { name: "py".into() });
        assert!(md.starts_with("# Error: Unknown Domain"));
        assert!(md.contains("## Fix"));
    }

    #[test]
    fn generic_render_uses_display() {
        let md = render_error(&Error::MissingParser);
        assert!(md.contains("no parser is set"));
    }
}
