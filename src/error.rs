use std::{io, path::PathBuf};

use thiserror::Error;

/// Failure to materialize a raw table from its source file.
///
/// This is the only failure class the engine surfaces; mapping and coercion
/// anomalies are absorbed into missing values instead.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed delimited input: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row} could not be decoded as {encoding}")]
    Decode { row: usize, encoding: &'static str },
    #[error("malformed JSON input: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported JSON layout: {0}")]
    JsonShape(String),
    #[error("row {row} has {found} field(s) but the header declares {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}
