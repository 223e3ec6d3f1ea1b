//! PDF header sniffing.
//!
//! The pipeline refuses to hand anything that is not a PDF to the parser,
//! so that a mis-selected file is reported as unreadable input instead of
//! a parser failure deep inside the run.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// `%PDF-` followed by a `d.d` version.
const PDF_MAGIC: &[u8] = b"%PDF-";
const HEADER_LEN: usize = PDF_MAGIC.len() + 3;

/// Some producers emit leading garbage before the header.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// The PDF header found at the start of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfHeader {
    /// Declared version, e.g. "1.7"
    pub version: String,
    /// Byte offset of `%PDF-`
    pub offset: usize,
}

impl std::fmt::Display for PdfHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF {}", self.version)
    }
}

/// Read the start of `path` and locate its PDF header.
pub fn sniff_path<P: AsRef<Path>>(path: P) -> Result<PdfHeader> {
    let mut head = Vec::with_capacity(HEADER_SEARCH_WINDOW);
    File::open(path)?
        .take(HEADER_SEARCH_WINDOW as u64)
        .read_to_end(&mut head)?;
    sniff_bytes(&head)
}

/// Locate the PDF header in the first kilobyte of `data`.
pub fn sniff_bytes(data: &[u8]) -> Result<PdfHeader> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let offset = window
        .windows(PDF_MAGIC.len())
        .position(|w| w == PDF_MAGIC)
        .ok_or(Error::UnknownFormat)?;

    let header = window
        .get(offset..offset + HEADER_LEN)
        .ok_or(Error::UnknownFormat)?;
    let version = String::from_utf8_lossy(&header[PDF_MAGIC.len()..]).to_string();

    match version.as_bytes() {
        [major, b'.', minor] if major.is_ascii_digit() && minor.is_ascii_digit() => {
            Ok(PdfHeader { version, offset })
        }
        _ => Err(Error::UnsupportedVersion(version)),
    }
}

/// Check whether `path` starts like a PDF file.
pub fn is_pdf<P: AsRef<Path>>(path: P) -> bool {
    sniff_path(path).is_ok()
}
