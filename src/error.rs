//! Central error types for shroud.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic
//! `Display` and `From` implementations.
//!
//! Failure to resolve the type of an expression is *not* an error: the
//! resolution engine returns [`crate::resolve::Resolution::Unresolved`] as an
//! ordinary value. Errors here are reserved for conditions where continuing
//! would corrupt the symbol tables or the rewritten output.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum ShroudError {
    /// IO operation failed (without path context - prefer IoWithPath when path is available)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO operation failed with path context for better error messages
    #[error("IO error at {path}: {error}")]
    IoWithPath {
        error: std::io::Error,
        path: PathBuf,
    },

    /// Missing or malformed configuration (file list, ignore list, extern types)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Structural invariant violation mid-pass: unbalanced delimiters, a
    /// typedef redefined with a different body, an expected token shape not
    /// found. Fatal - the analysis cannot continue safely.
    #[error("Structure error in {file}: {message}")]
    Structure { file: String, message: String },

    /// JSON serialization error in report output
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Report emission failed
    #[error("Report error: {0}")]
    Report(String),
}

/// Convenience type alias for Results using ShroudError.
pub type Result<T> = std::result::Result<T, ShroudError>;

impl ShroudError {
    /// Create an IO error with path context.
    ///
    /// Use this when reading/writing files to provide actionable error
    /// messages that include the file path that failed.
    #[inline]
    pub fn io_with_path(error: std::io::Error, path: impl AsRef<Path>) -> Self {
        ShroudError::IoWithPath {
            error,
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create a structural invariant violation for the given file.
    #[inline]
    pub fn structure(file: impl AsRef<Path>, message: impl Into<String>) -> Self {
        ShroudError::Structure {
            file: file.as_ref().display().to_string(),
            message: message.into(),
        }
    }
}
