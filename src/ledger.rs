//! The set of label codes already accepted during one run.

use std::collections::HashSet;

use crate::label::LabelCode;

/// Codes accepted so far. Grows monotonically; there is no removal.
#[derive(Debug, Clone, Default)]
pub struct SeenLabels {
    codes: HashSet<LabelCode>,
}

impl SeenLabels {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `code` has been accepted before.
    pub fn contains(&self, code: &LabelCode) -> bool {
        self.codes.contains(code)
    }

    /// Record `code`. Returns `true` if it was not seen before.
    pub fn insert(&mut self, code: LabelCode) -> bool {
        self.codes.insert(code)
    }

    /// Number of distinct codes seen.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether nothing has been accepted yet.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Seen codes, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &LabelCode> {
        self.codes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_unique() {
        let mut seen = SeenLabels::new();
        assert!(seen.is_empty());

        assert!(seen.insert(LabelCode::new("*ST123R4TABCD 5678*")));
        assert!(!seen.insert(LabelCode::new("*ST123R4TABCD 5678*")));
        assert_eq!(seen.len(), 1);
        assert!(seen.contains(&LabelCode::new("*ST123R4TABCD 5678*")));
        assert!(!seen.contains(&LabelCode::new("*ST999R9TZZZZ 9999*")));
    }

    #[test]
    fn test_iter() {
        let mut seen = SeenLabels::new();
        seen.insert(LabelCode::new("a"));
        seen.insert(LabelCode::new("b"));
        let mut codes: Vec<&str> = seen.iter().map(|c| c.as_str()).collect();
        codes.sort();
        assert_eq!(codes, vec!["a", "b"]);
    }
}
