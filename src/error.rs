/// Crate-level error types for doctrack diagnostics.
use std::path::PathBuf;

/// All errors in doctrack carry enough context to produce a useful diagnostic
/// without a debugger. Each variant names the document, path, or key involved.
#[allow(clippy::error_impl_error, reason = "crate-wide error type re-exported from the library root")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Walking the source root failed while discovering documents.
    #[error("failed to scan documents in {}: {reason}", root.display())]
    DiscoveryFailed {
        /// Description of the underlying I/O failure.
        reason: String,
        /// Source root that was being scanned.
        root: PathBuf,
    },

    /// A persisted parsed-tree artifact does not exist for this document.
    #[error("no parsed tree for `{docname}` at {}", path.display())]
    DoctreeNotFound {
        /// Document whose artifact was requested.
        docname: String,
        /// Expected artifact path.
        path: PathBuf,
    },

    /// A domain could not export, import, or merge its data.
    #[error("domain `{domain}` data error: {reason}")]
    DomainData {
        /// Name of the domain that failed.
        domain: String,
        /// Description of the failure.
        reason: String,
    },

    /// Two different versioning methods were applied to one persisted state.
    #[error(
        "the persisted inventory uses versioning method `{current}` and cannot switch to \
         `{requested}`; discard the artifacts directory"
    )]
    IncompatibleVersioning {
        /// Method already recorded in the inventory.
        current: String,
        /// Method that was requested.
        requested: String,
    },

    /// An ignore pattern in the configuration is not a valid regular expression.
    #[error("invalid ignore pattern `{pattern}`: {reason}")]
    InvalidIgnorePattern {
        /// The offending pattern text.
        pattern: String,
        /// Compiler error message.
        reason: String,
    },

    /// The requested versioning method name is not known.
    #[error("invalid versioning method: `{method}`")]
    InvalidVersioningMethod {
        /// The unknown method name.
        method: String,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON (de)serialization failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped JSON error.
        #[from]
        serde_json::Error,
    ),

    /// The scratch context was asked for the parser before one was set.
    #[error("no parser is set for the current document")]
    MissingParser,

    /// The external markup parser rejected a document.
    #[error("failed to parse `{docname}`: {reason}")]
    Parse {
        /// Document that failed to parse.
        docname: String,
        /// Parser-provided description of the failure.
        reason: String,
    },

    /// A value of the wrong type was written to a fixed scratch key.
    #[error("scratch key `{key}` expects {expected}")]
    ScratchType {
        /// Expected value type.
        expected: &'static str,
        /// Key being written.
        key: String,
    },

    /// The persisted snapshot was recorded for a different source root.
    #[error("source directory has changed: {} (recorded {})", current.display(), recorded.display())]
    SourceRootChanged {
        /// Source root of the current run.
        current: PathBuf,
        /// Source root stored in the snapshot.
        recorded: PathBuf,
    },

    /// A tag expression in a visibility conditional could not be parsed.
    #[error("invalid tag expression `{expr}`: {reason}")]
    TagExpression {
        /// The expression text.
        expr: String,
        /// What went wrong.
        reason: String,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// A docname is not known to the inventory.
    #[error("unknown document: `{docname}`")]
    UnknownDocument {
        /// The unknown docname.
        docname: String,
    },

    /// No domain is registered under the given name.
    #[error("domain `{name}` is not registered")]
    UnknownDomain {
        /// Domain name that was not found.
        name: String,
    },

    /// The persisted snapshot was written by an incompatible version.
    #[error("build inventory version not current: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version stamp of the current run.
        expected: String,
        /// Version stamp recorded in the snapshot.
        found: String,
    },
}
