//! Dataset loading for bundle adjustment problems.
//!
//! Currently supports the Bundle Adjustment in the Large (BAL) text format.

use thiserror::Error;
use tracing::error;

pub mod bal;

pub use bal::{BalCamera, BalDataset, BalLoader, BalObservation, BalPoint};

/// Errors that can occur while reading a dataset file.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid number format at line {line}: {value}")]
    InvalidNumber { line: usize, value: String },

    #[error("Missing required fields at line {line}")]
    MissingFields { line: usize },

    #[error("{kind} index {index} out of range at line {line} (count {count})")]
    IndexOutOfRange {
        kind: &'static str,
        line: usize,
        index: usize,
        count: usize,
    },
}

impl IoError {
    /// Log the error with `tracing::error!` and return it.
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error together with the context that produced it, then return it.
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}
