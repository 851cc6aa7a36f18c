// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Failures while enumerating the remote file index. Always fatal to a run.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("listing {url} unreachable: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("listing {url} contains no year directories")]
    EmptyListing { url: String },

    #[error("invalid listing url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Failures of a table load, save or transform.
#[derive(Debug, Error)]
pub enum TableError {
    /// A requested column is absent from the header. Aborts the transform.
    #[error("column `{column}` not found in header")]
    ColumnNotFound { column: String },

    #[error("i/o on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid validation pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("no input tables given")]
    EmptyInput,
}

impl TableError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TableError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn missing(column: &str) -> Self {
        TableError::ColumnNotFound {
            column: column.to_string(),
        }
    }
}

/// Failures retrieving or unpacking a single archive. Logged and skipped.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("download of {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("download of {url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("extracting {path:?} failed: {source}")]
    Extract {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("i/o on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RetrievalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RetrievalError::Io {
            path: path.into(),
            source,
        }
    }
}
