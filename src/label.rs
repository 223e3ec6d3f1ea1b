//! Label codes and the pattern that recognizes them.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// `*ST<3 digits>R<digit>T<4 word chars> <4 digits>*`, e.g. `*ST123R4TABCD 5678*`.
pub const DEFAULT_LABEL_PATTERN: &str = r"\*ST\d{3}R\dT\w{4} \d{4}\*";

/// A label code as printed on the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelCode(String);

impl LabelCode {
    /// Wrap a matched code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The code text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LabelCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LabelCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compiled label pattern.
#[derive(Debug, Clone)]
pub struct LabelPattern {
    regex: Regex,
}

impl LabelPattern {
    /// Compile a custom pattern.
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    /// The pattern source.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// All non-overlapping codes in `text`, left to right.
    ///
    /// Blank text yields nothing without running the regex.
    pub fn find_codes(&self, text: &str) -> Vec<LabelCode> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.regex
            .find_iter(text)
            .map(|m| LabelCode::new(m.as_str()))
            .collect()
    }
}

impl Default for LabelPattern {
    fn default() -> Self {
        Self {
            regex: Regex::new(DEFAULT_LABEL_PATTERN).expect("default label pattern is valid"),
        }
    }
}
