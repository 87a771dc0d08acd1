//! Error types for jstester

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for jstester operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for jstester
///
/// Only run-level failures are represented here. A single test that fails,
/// times out or cannot be spawned is reported through its outcome and never
/// surfaces as an `Error`.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file error or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The executable under test does not exist.
    #[error("Executable under test not found at {0}")]
    ExecutableNotFound(PathBuf),

    /// A skip-list or sequential-list file does not exist.
    #[error("Test list file not found at {0}")]
    ListFileNotFound(PathBuf),

    /// A requested test folder does not exist.
    #[error("Test folder not found at {0}")]
    TestFolderNotFound(PathBuf),

    /// The final counters disagree with the number of discovered tests.
    #[error("Accounting mismatch: {actual} tests accounted for, {expected} discovered")]
    AccountingMismatch { expected: usize, actual: usize },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Invalid regular expression.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Other error with custom message.
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}
