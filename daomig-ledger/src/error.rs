//! Error types for daomig-ledger.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from state store and record operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (write path).
    #[error("state JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON parse error on load, with the offending file.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// State written by an incompatible release.
    #[error("unsupported state format {found} in {path} (expected {expected})")]
    UnsupportedFormat {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    /// Another run holds the per-network lock.
    #[error("another migration for this network is running (lock held on {path})")]
    Locked { path: PathBuf },

    /// Attempt to overwrite a write-once field with a different value.
    #[error("`{field}` is already set to {existing}; refusing to change it to {attempted}")]
    ImmutableField {
        field: &'static str,
        existing: String,
        attempted: String,
    },
}

/// Convenience constructor for [`LedgerError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> LedgerError {
    LedgerError::Io {
        path: path.into(),
        source,
    }
}
