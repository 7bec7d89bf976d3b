//! Error types for result parsing and comparison

use std::path::PathBuf;

/// ltlcross 結果の解析・比較で発生するエラー
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The results CSV does not exist (ltlcross has not been run yet)
    #[error("results file not found: {}", .0.display())]
    ResultsNotFound(PathBuf),

    /// The diagnostic log does not exist
    #[error("log file not found: {}", .0.display())]
    LogNotFound(PathBuf),

    /// A query needs parsed results but `parse_results` has not run
    #[error("no results parsed yet")]
    NoResults,

    /// Unknown tool, statistic column, error kind or formula id
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed results file
    #[error("{}: row {row}: {message}", path.display())]
    ResultsFormat { path: PathBuf, row: usize, message: String },

    /// Malformed session configuration
    #[error("config error in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl Error {
    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        Error::InvalidArgument(what.into())
    }
}

/// Result type for ltlcross-stats operations
pub type Result<T> = std::result::Result<T, Error>;
