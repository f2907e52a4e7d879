//! Error types shared by every stage of training.

use thiserror::Error;

/// Failures surfaced by corpus loading, model construction and training.
#[derive(Debug, Error)]
pub enum Error {
    /// A sequence has probability exactly 0 under the current model, so its plog
    /// is undefined.
    #[error("sequence {sequence:?} has zero probability under the current model")]
    ZeroProbability { sequence: String },

    /// A distribution that must be normalized is not (within tolerance).
    #[error("degenerate distribution: {what} sums to {sum}")]
    DegenerateDistribution { what: String, sum: f64 },

    /// Bad arguments or a broken collaborator contract.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// I/O error while reading a corpus.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub(crate) fn degenerate(what: impl Into<String>, sum: f64) -> Self {
        Error::DegenerateDistribution {
            what: what.into(),
            sum,
        }
    }

    /// True for numeric failures that end training as diverged rather than
    /// aborting the run.
    pub fn is_divergence(&self) -> bool {
        matches!(self, Error::ZeroProbability { .. })
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
