use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for labeling, classification and sink persistence failures.
#[derive(Debug, Error)]
pub enum SiftError {
    #[error("invalid key field '{0}': expected one of email, password, ip, url, phone_number")]
    InvalidKeyField(String),

    #[error("failed to scan reference file {path}: {source}")]
    ReferenceScan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write result sink {path}: {source}")]
    SinkWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read input {path}: {source}")]
    InputRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("reference directory {0} does not exist or is not a directory")]
    MissingReferenceDirectory(PathBuf),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("tabular output error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("worker pool error: {0}")]
    WorkerPool(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SiftError {
    pub fn sink_write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::SinkWrite {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SiftError>;
