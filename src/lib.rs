//! # labelslice
//!
//! Split shipping-label sheets into one PDF per label.
//!
//! Every page of the input is cut into horizontal bands of a fixed height,
//! top to bottom. A band is kept only when its visible text carries a label
//! code that no earlier band carried, so a sheet that prints each label twice
//! (or pads pages with blank bands) comes out as exactly one file per label.
//!
//! ## Quick Start
//!
//! ```no_run
//! use labelslice::split_labels;
//!
//! fn main() -> labelslice::Result<()> {
//!     let records = split_labels("labels.pdf", "out")?;
//!     for record in &records {
//!         println!("{} -> {}", record.label, record.path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Positioned text**: codes are read only from text drawn inside the band
//! - **First occurrence wins**: duplicate labels are dropped in page order
//! - **Parallel preparation**: bands are cropped and scanned with Rayon
//! - **Configurable**: band height, label pattern, staging and error mode
//! - **Printing hooks**: collaborator traits and a command-based printer

pub mod collab;
pub mod detect;
pub mod detector;
pub mod document;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod label;
pub mod ledger;
pub mod options;
pub mod pipeline;
pub mod text;

#[cfg(test)]
mod testutil;

// Re-export commonly used types
pub use collab::{
    print_all, CommandPrinter, FileSelector, Preselected, PrintDispatcher, PrintOutcome,
    PrintReport, PrinterSelector,
};
pub use detect::{is_pdf, sniff_bytes, sniff_path, PdfHeader};
pub use detector::{detect_label, LabelDetector, Verdict};
pub use document::{SourceDocument, SourcePage};
pub use error::{Error, Result};
pub use extract::{extract_slice, PageTemplate, SliceDocument};
pub use geometry::{slice_rects, CropRect, DEFAULT_BAND_HEIGHT};
pub use label::{LabelCode, LabelPattern, DEFAULT_LABEL_PATTERN};
pub use ledger::SeenLabels;
pub use options::{ErrorMode, SliceOptions, Staging};
pub use pipeline::{
    Band, OutputRecord, Rejection, SliceEvent, SlicePipeline, SliceReport, SliceStats,
};
pub use text::ExtractionScope;

use std::path::Path;

/// Split a label sheet with default options.
///
/// # Arguments
///
/// * `path` - Path to the PDF file
/// * `output_dir` - Directory for the kept slices, created if missing
///
/// # Returns
///
/// The kept slices in page then top-to-bottom order. An empty list means no
/// band carried a label code.
///
/// # Example
///
/// ```no_run
/// use labelslice::split_labels;
///
/// let records = split_labels("labels.pdf", "out").unwrap();
/// println!("Labels: {}", records.len());
/// ```
pub fn split_labels<P: AsRef<Path>, Q: AsRef<Path>>(
    path: P,
    output_dir: Q,
) -> Result<Vec<OutputRecord>> {
    split_labels_with_options(path, output_dir, SliceOptions::default())
}

/// Split a label sheet with custom options.
pub fn split_labels_with_options<P: AsRef<Path>, Q: AsRef<Path>>(
    path: P,
    output_dir: Q,
    options: SliceOptions,
) -> Result<Vec<OutputRecord>> {
    let report = SlicePipeline::new(options)?.run(path, output_dir)?;
    Ok(report.records)
}

/// Split a label sheet held in memory.
pub fn split_bytes<Q: AsRef<Path>>(data: &[u8], output_dir: Q, options: SliceOptions) -> Result<SliceReport> {
    let source = SourceDocument::from_bytes(data)?;
    SlicePipeline::new(options)?.run_document(&source, output_dir)
}

/// Builder for configuring a split.
///
/// # Example
///
/// ```no_run
/// use labelslice::LabelSlicer;
///
/// let report = LabelSlicer::new()
///     .with_band_height(200.0)
///     .strict()
///     .split("labels.pdf", "out")?;
/// println!("Kept {} of {}", report.stats.accepted, report.stats.candidates);
/// # Ok::<(), labelslice::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct LabelSlicer {
    options: SliceOptions,
}

impl LabelSlicer {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the band height in points.
    pub fn with_band_height(mut self, band_height: f64) -> Self {
        self.options = self.options.with_band_height(band_height);
        self
    }

    /// Abort on the first band that cannot be extracted.
    pub fn strict(mut self) -> Self {
        self.options = self.options.strict();
        self
    }

    /// Skip bands that cannot be extracted.
    pub fn lenient(mut self) -> Self {
        self.options = self.options.with_error_mode(ErrorMode::Lenient);
        self
    }

    /// Stage slices as temporary files in the output directory.
    pub fn temp_files(mut self) -> Self {
        self.options = self.options.temp_files();
        self
    }

    /// Search the whole content stream of each band, not only its visible part.
    pub fn whole_page_text(mut self) -> Self {
        self.options = self.options.with_scope(ExtractionScope::ContentStream);
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.options = self.options.sequential();
        self
    }

    /// Use a custom label pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.options = self.options.with_pattern(pattern);
        self
    }

    /// The options built so far.
    pub fn options(&self) -> &SliceOptions {
        &self.options
    }

    /// Split `path` into `output_dir`.
    pub fn split<P: AsRef<Path>, Q: AsRef<Path>>(self, path: P, output_dir: Q) -> Result<SliceReport> {
        SlicePipeline::new(self.options)?.run(path, output_dir)
    }
}
