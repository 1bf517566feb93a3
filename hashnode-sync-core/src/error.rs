//! Error types for hashnode-sync-core.
//!
//! Per-file errors ([`ParseError`], [`AssetPathError`]) and per-item errors
//! ([`ApiError`]) are caught by the engine and funnelled into the run report.
//! Only [`SyncError`] escapes a run, wrapped in an [`AbortedRun`] that keeps
//! the partial report.

use std::path::PathBuf;

use thiserror::Error;

/// The frontmatter block of a document is missing or invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("missing frontmatter block (expected a leading `---` line)")]
    MissingFrontmatter,

    #[error("frontmatter block is not closed by a `---` line")]
    UnterminatedFrontmatter,

    #[error("frontmatter is not valid YAML: {0}")]
    InvalidYaml(String),

    #[error("missing required frontmatter field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for frontmatter field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("post content cannot be empty")]
    EmptyBody,
}

/// A relative asset reference cannot be turned into a repository path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetPathError {
    #[error("asset path `{0}` escapes the repository root")]
    EscapesRoot(String),

    #[error("empty asset reference")]
    Empty,
}

/// Anything that stops a single document from becoming a post intent.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    AssetPath(#[from] AssetPathError),
}

/// Failure reported by a [`crate::contract::PostApi`] implementation.
///
/// Transient errors (5xx, rate limiting, transport failures) are retried by
/// the engine; permanent ones are recorded immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("transient API error: {0}")]
    Transient(String),

    #[error("API error: {0}")]
    Permanent(String),
}

impl ApiError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Transient(_))
    }
}

/// The remote post index could not be built in full.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("remote post index unavailable: {0}")]
pub struct ApiUnavailableError(pub String);

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    ApiUnavailable(#[from] ApiUnavailableError),

    #[error("duplicate slug `{slug}` declared by {paths:?}")]
    DuplicateSlug { slug: String, paths: Vec<PathBuf> },
}

/// A run that was aborted, together with what it recorded before stopping.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct AbortedRun {
    #[source]
    pub source: SyncError,
    /// Per-item outcomes gathered before the abort, e.g. documents that failed to parse.
    pub partial: crate::report::RunReport,
}
