//! Error handling for filswap
//!
//! Provides error types for the layers of the tool:
//! - G-Code errors (reading and interpreting sliced documents)
//! - I/O errors (files and standard streams)
//!
//! All error types use `thiserror` for ergonomic error handling.
//! Most conditions found while scanning a document are not errors at all;
//! they are logged and the scan degrades gracefully.

use thiserror::Error;

/// G-Code error type
///
/// Represents errors related to reading G-Code documents.
#[derive(Error, Debug, Clone)]
pub enum GcodeError {
    /// The document could not be read or contains no usable text
    #[error("File error: {reason}")]
    FileError {
        /// The reason for the file error.
        reason: String,
    },
}

/// Main error type for filswap
///
/// A unified error type used in the public APIs of the library crates.
#[derive(Error, Debug)]
pub enum Error {
    /// G-Code error
    #[error(transparent)]
    Gcode(#[from] GcodeError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this is a G-Code error
    pub fn is_gcode_error(&self) -> bool {
        matches!(self, Error::Gcode(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
