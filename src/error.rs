use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading inputs or configuring a simulation.
///
/// Every variant is fatal: inputs are checked once before any station runs.
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    /// An input file could not be opened
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The CSV itself is malformed (ragged rows, bad encoding)
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is absent from the header
    #[error("{input} is missing required column '{column}'")]
    MissingColumn { input: &'static str, column: String },

    /// A timestamp matched none of the accepted formats
    #[error("unparseable timestamp '{value}' in ephemeris row {row}")]
    InvalidTimestamp { row: usize, value: String },

    /// A coordinate field is not a number
    #[error("{input} row {row}: column '{column}' holds non-numeric value '{value}'")]
    InvalidNumber {
        input: &'static str,
        row: usize,
        column: String,
        value: String,
    },

    /// Ephemeris timestamps must strictly increase
    #[error("ephemeris row {row} is not later than the row before it")]
    NonMonotonicTime { row: usize },

    /// An input holds a header but no rows
    #[error("{input} contains no data rows")]
    Empty { input: &'static str },

    /// A simulation parameter is out of range
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Report serialization failed
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias over [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}
