use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Pipeline error taxonomy
// ---------------------------------------------------------------------------

/// Fatal failures of a pipeline stage. Non-fatal conditions (coercion and
/// polynomial-fit problems) are logged and reported instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing input/output directory or no matching input files.
    #[error("not found: {0}")]
    NotFound(String),

    /// Selected columns absent from the merged dataset.
    #[error("selected columns not found in merged data: {}", .missing.join(", "))]
    Validation { missing: Vec<String> },

    /// Invalid run configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A data row with more fields than the header.
    #[error(
        "malformed row in {} at line {line}: {found} fields, header has {expected}",
        .path.display()
    )]
    MalformedRow {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("failed to render chart {}: {message}", .path.display())]
    Chart { path: PathBuf, message: String },
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        PipelineError::Csv {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
