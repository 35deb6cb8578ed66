//! File formats for voicetrack.
//!
//! Reads and writes `.vtpk` peak dumps and exports voice frames as CSV.

mod csv;
mod peak_format;

pub use csv::{write_csv, CsvWriter};
pub use peak_format::{load_peaks, peaks_to_bytes, save_peaks, FORMAT_VERSION};

use core::fmt;

/// Error type for format parsing.
#[derive(Debug)]
pub enum FormatError {
    /// Invalid file header, magic bytes or record counts
    InvalidHeader,
    /// Unexpected end of file
    UnexpectedEof,
    /// Unsupported format version
    UnsupportedVersion(u16),
    /// I/O error
    Io(String),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::InvalidHeader => write!(f, "invalid peak file header"),
            FormatError::UnexpectedEof => write!(f, "unexpected end of file"),
            FormatError::UnsupportedVersion(v) => write!(f, "unsupported peak file version {}", v),
            FormatError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for FormatError {}

impl From<std::io::Error> for FormatError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => FormatError::UnexpectedEof,
            _ => FormatError::Io(e.to_string()),
        }
    }
}
