//! Error types for labelslice.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for labelslice operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while slicing a label sheet.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input document does not exist.
    #[error("Input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// The input exists but could not be opened as a PDF document.
    #[error("Input unreadable: {0}")]
    InputUnreadable(String),

    /// The file format is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// The PDF document is encrypted.
    #[error("Document is encrypted")]
    Encrypted,

    /// Error navigating the PDF object structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// A single band could not be cropped or serialized.
    #[error("Slice {index} (page {page}) could not be extracted: {reason}")]
    SliceExtraction {
        /// Source page number (1-based)
        page: u32,
        /// Candidate slice number
        index: u32,
        /// Underlying cause
        reason: String,
    },

    /// The text layer of a slice could not be read.
    #[error("Text extraction error: {0}")]
    TextExtract(String),

    /// The configured band height cannot tile a page.
    #[error("Invalid band height: {0} (must be a finite number of points, at least 1)")]
    InvalidBandHeight(f64),

    /// The configured label pattern is not a valid regular expression.
    #[error("Invalid label pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// A print job could not be handed to the printer.
    #[error("Could not print {}: {reason}", path.display())]
    PrintDispatch {
        /// File that was being printed
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

impl Error {
    /// Whether this error aborts a run before any output is produced.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::InputNotFound(_)
                | Error::InputUnreadable(_)
                | Error::UnknownFormat
                | Error::UnsupportedVersion(_)
                | Error::Encrypted
        )
    }
}
