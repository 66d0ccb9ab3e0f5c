//! Error types for the iris_dnn crate.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for loading, training and evaluation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{path}: malformed header: {reason}")]
    Header { path: PathBuf, reason: String },

    #[error("{path}, line {line}: cannot parse field {column} ({value:?})")]
    Parse {
        path: PathBuf,
        line: usize,
        column: usize,
        value: String,
    },

    #[error("{path}, line {line}: expected {expected} fields, found {found}")]
    RowWidth {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("{path}: header declares {expected} rows, file has {found}")]
    RowCount {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("Shape mismatch: feature columns declare dimension {expected}, data has {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("Label {label} out of range for {n_classes} classes")]
    LabelOutOfRange { label: usize, n_classes: usize },

    #[error("Dataset is empty")]
    EmptyDataset,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
