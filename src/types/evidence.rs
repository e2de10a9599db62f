//! Extractor outputs and the evidence spans backing them

use serde::{Deserialize, Serialize};

/// A localized justification inside the turn text.
/// Offsets are character offsets, `start < end <= text.chars().count()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSpan {
    pub span_id: String,
    pub turn_id: String,
    pub layer_id: String,
    pub start: usize,
    pub end: usize,
    pub score: f64,
    pub confidence: f64,
    pub attribution_method_id: String,
    pub extractor_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl EvidenceSpan {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// The covered text, if the offsets are valid for `text`
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        if self.end < self.start {
            return None;
        }
        let mut indices = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len()));
        let start = indices.nth(self.start)?;
        let end = if self.end == self.start {
            start
        } else {
            indices.nth(self.end - self.start - 1)?
        };
        text.get(start..end)
    }
}

/// One extractor's result for one turn, shared by every scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerOutput {
    pub layer_id: String,
    /// Clamped to [0, 1]
    pub score: f64,
    /// Clamped to [0, 1], never exactly 0
    pub confidence: f64,
    pub evidence: Vec<EvidenceSpan>,
}
