//! Error taxonomy for training, persistence and scoring.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, FraudModelError>;

/// Failures surfaced by the fraud model lifecycle.
///
/// Scoring itself never fails on malformed input; these errors come from
/// obtaining a model bundle (load, train, persist).
#[derive(Debug, Error)]
pub enum FraudModelError {
    /// No usable fraud-label column in the training data.
    #[error("could not find fraud target column, expected one of: {expected}")]
    MissingTarget { expected: String },

    /// A label value that is neither Yes/No nor numeric.
    #[error("row {row}: cannot interpret fraud label {value:?}")]
    InvalidLabel { row: usize, value: String },

    /// Dataset fetch succeeded but produced no tabular file.
    #[error("dataset fetch succeeded but no CSV files were found in {}", dir.display())]
    NoTabularFiles { dir: PathBuf },

    /// The selected table has a header but no rows.
    #[error("training table contains no rows")]
    EmptyDataset,

    /// Persisted bundle was written by an incompatible format version.
    #[error("bundle format version {found} is not supported (expected {expected})")]
    IncompatibleBundle { found: u32, expected: u32 },

    #[error("bundle storage failure: {0}")]
    Storage(String),

    #[error("model cache lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl FraudModelError {
    /// Whether a later attempt may succeed without changing the input data.
    pub fn is_retryable(&self) -> bool {
        match self {
            FraudModelError::MissingTarget { .. }
            | FraudModelError::InvalidLabel { .. }
            | FraudModelError::EmptyDataset
            | FraudModelError::IncompatibleBundle { .. }
            | FraudModelError::Csv(_) => false,
            FraudModelError::NoTabularFiles { .. }
            | FraudModelError::Storage(_)
            | FraudModelError::LockPoisoned
            | FraudModelError::Io(_)
            | FraudModelError::Serialization(_) => true,
        }
    }
}
