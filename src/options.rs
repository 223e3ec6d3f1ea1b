//! Pipeline options and configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::{validate_band_height, DEFAULT_BAND_HEIGHT};
use crate::label::{LabelPattern, DEFAULT_LABEL_PATTERN};
use crate::text::ExtractionScope;

/// Default file name prefix of staged slices.
pub const DEFAULT_TEMP_PREFIX: &str = "TEMP_Part_";

/// Default file name prefix of accepted slices.
pub const DEFAULT_OUTPUT_PREFIX: &str = "TextLabel_Part_";

/// Options for splitting a label sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceOptions {
    /// Height of one label band in points
    pub band_height: f64,

    /// What to do when a single band cannot be extracted
    pub error_mode: ErrorMode,

    /// Where slices live while they are being checked
    pub staging: Staging,

    /// Which part of a slice's text layer is searched for codes
    pub scope: ExtractionScope,

    /// Whether to prepare bands in parallel
    pub parallel: bool,

    /// Label code regular expression
    pub pattern: String,

    /// File name prefix of staged slices
    pub temp_prefix: String,

    /// File name prefix of accepted slices
    pub output_prefix: String,
}

impl SliceOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the band height in points.
    pub fn with_band_height(mut self, band_height: f64) -> Self {
        self.band_height = band_height;
        self
    }

    /// Set error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Abort the run on the first band that cannot be extracted.
    pub fn strict(mut self) -> Self {
        self.error_mode = ErrorMode::Strict;
        self
    }

    /// Set staging mode.
    pub fn with_staging(mut self, staging: Staging) -> Self {
        self.staging = staging;
        self
    }

    /// Stage every slice as a temporary file in the output directory.
    pub fn temp_files(mut self) -> Self {
        self.staging = Staging::TempFile;
        self
    }

    /// Set extraction scope.
    pub fn with_scope(mut self, scope: ExtractionScope) -> Self {
        self.scope = scope;
        self
    }

    /// Enable or disable parallel band preparation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set the label code pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Set the staged and accepted file name prefixes.
    pub fn with_prefixes(mut self, temp: impl Into<String>, output: impl Into<String>) -> Self {
        self.temp_prefix = temp.into();
        self.output_prefix = output.into();
        self
    }

    /// Check the options and compile the label pattern.
    pub fn validate(&self) -> Result<LabelPattern> {
        validate_band_height(self.band_height)?;
        LabelPattern::new(&self.pattern)
    }

    /// File name of the staged slice for candidate `index`.
    pub fn temp_name(&self, index: u32) -> String {
        format!("{}{}.pdf", self.temp_prefix, index)
    }

    /// File name of the accepted slice for candidate `index`.
    pub fn output_name(&self, index: u32) -> String {
        format!("{}{}.pdf", self.output_prefix, index)
    }
}

impl Default for SliceOptions {
    fn default() -> Self {
        Self {
            band_height: DEFAULT_BAND_HEIGHT,
            error_mode: ErrorMode::Lenient,
            staging: Staging::InMemory,
            scope: ExtractionScope::Visible,
            parallel: true,
            pattern: DEFAULT_LABEL_PATTERN.to_string(),
            temp_prefix: DEFAULT_TEMP_PREFIX.to_string(),
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
        }
    }
}

/// Error handling mode for per-band failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorMode {
    /// Abort the run
    Strict,
    /// Skip the band and continue
    #[default]
    Lenient,
}

/// Where a candidate slice is kept while its text is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Staging {
    /// Read text from the in-memory slice; only accepted slices touch the disk
    #[default]
    InMemory,
    /// Write every slice to a temporary file and read text back from it
    TempFile,
}
