//! Keep/reject decisions for candidate slices.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::extract::SliceDocument;
use crate::label::{LabelCode, LabelPattern};
use crate::ledger::SeenLabels;
use crate::text::ExtractionScope;

/// Outcome of checking one slice against the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// The slice carries a code not seen before; the code is now recorded.
    Accepted(LabelCode),
    /// Every code on the slice was already accepted.
    Duplicate,
    /// No code on the slice at all.
    NoLabel,
}

impl Verdict {
    /// Whether the slice should be kept.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }
}

/// Reads slice text and decides whether a slice holds a new label.
#[derive(Debug, Clone, Default)]
pub struct LabelDetector {
    pattern: LabelPattern,
    scope: ExtractionScope,
}

impl LabelDetector {
    /// Create a detector with the default pattern and visible-only text.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different label pattern.
    pub fn with_pattern(mut self, pattern: LabelPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Set which part of the text layer is read.
    pub fn with_scope(mut self, scope: ExtractionScope) -> Self {
        self.scope = scope;
        self
    }

    /// The label pattern in use.
    pub fn pattern(&self) -> &LabelPattern {
        &self.pattern
    }

    /// Extract every code on a slice, in text order.
    pub fn scan(&self, slice: &SliceDocument) -> Result<Vec<LabelCode>> {
        let text = slice.text(self.scope)?;
        Ok(self.pattern.find_codes(&text))
    }

    /// Decide on already extracted codes.
    ///
    /// The first code not in `seen` is recorded and wins, even when later
    /// codes on the same slice would also be new.
    pub fn decide(&self, codes: &[LabelCode], seen: &mut SeenLabels) -> Verdict {
        if codes.is_empty() {
            return Verdict::NoLabel;
        }
        match codes.iter().find(|code| !seen.contains(code)) {
            Some(code) => {
                seen.insert(code.clone());
                Verdict::Accepted(code.clone())
            }
            None => Verdict::Duplicate,
        }
    }

    /// Scan a slice and decide on it.
    ///
    /// A slice whose text cannot be read counts as holding no label.
    pub fn detect(&self, slice: &SliceDocument, seen: &mut SeenLabels) -> Verdict {
        match self.scan(slice) {
            Ok(codes) => self.decide(&codes, seen),
            Err(e) => {
                log::warn!("Could not read slice text, treating it as blank: {}", e);
                Verdict::NoLabel
            }
        }
    }
}

/// Keep `slice` if it carries a label code not yet in `seen`, recording that code.
pub fn detect_label(slice: &SliceDocument, seen: &mut SeenLabels) -> bool {
    LabelDetector::default().detect(slice, seen).is_accepted()
}
