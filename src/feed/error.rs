//! Error types for local feed operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::package::PackageReadError;

/// Result alias for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;

/// Errors raised by local feed and index operations.
///
/// Absence is never an error: lookups return `Ok(None)` or empty
/// collections when a package is simply not there. These variants cover
/// whole-source problems, corrupt packages, and aborts.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The source root directory does not exist. Raised for queries so a
    /// misconfigured source is distinguishable from a cache miss.
    #[error("package source not found: {source_root}")]
    SourceNotFound { source_root: PathBuf },

    /// The source root is not usable as a local directory path.
    #[error("invalid package source '{root}': {reason}")]
    InvalidSource { root: String, reason: String },

    /// A package's metadata could not be read. Carries the offending
    /// package reference and the source root for diagnosability; the
    /// low-level cause is preserved, never surfaced raw.
    #[error("failed to read metadata for '{reference}' from {source_root}")]
    PackageMetadata {
        reference: String,
        source_root: PathBuf,
        #[source]
        cause: PackageReadError,
    },

    /// An I/O failure outside package parsing.
    #[error("I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The operation was cancelled. Never wrapped, so callers can
    /// distinguish an abort from a genuine failure.
    #[error("operation cancelled")]
    Cancelled,

    /// A background worker failed to complete.
    #[error("background task failed: {0}")]
    TaskJoin(String),
}

impl FeedError {
    /// True if this error is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FeedError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_not_found_names_the_source() {
        let err = FeedError::SourceNotFound {
            source_root: PathBuf::from("/missing/feed"),
        };
        assert!(err.to_string().contains("/missing/feed"));
    }

    #[test]
    fn test_is_cancelled() {
        assert!(FeedError::Cancelled.is_cancelled());
        assert!(!FeedError::TaskJoin("x".into()).is_cancelled());
    }
}
