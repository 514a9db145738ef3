use std::path::PathBuf;

/// Failures surfaced by the training and evaluation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("graph construction error: {0}")]
    GraphConstruction(String),

    #[error("batch window {start}..{end} holds {actual} examples, expected {expected}")]
    BatchReshape {
        start: usize,
        end: usize,
        actual: usize,
        expected: usize,
    },

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("failed to persist {}: {message}", .path.display())]
    Persistence { path: PathBuf, message: String },

    #[error("cannot render {len} values as a square image")]
    Render { len: usize },
}

impl Error {
    pub(crate) fn persistence(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Persistence {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
