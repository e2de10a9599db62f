//! Extractor capability shared by every signal layer

use regex::Regex;

use crate::types::{EvidenceSpan, LayerOutput, Turn};

/// A pure, stateless signal family.
///
/// Implementations must return identical output for identical input,
/// clamp score and confidence to [0, 1], keep confidence above a fixed
/// nonzero floor, and emit spans whose character offsets are valid
/// against `turn.text`.
pub trait Extractor: Send + Sync {
    /// Layer id, also the key used in baseline documents
    fn layer_id(&self) -> &'static str;

    /// Fixed version tag carried into event provenance
    fn version(&self) -> &'static str;

    fn extract(&self, turn: &Turn) -> LayerOutput;
}

/// Converts byte offsets from regex matches into character offsets
pub(crate) struct CharOffsets {
    starts: Vec<usize>,
}

impl CharOffsets {
    pub(crate) fn new(text: &str) -> Self {
        Self {
            starts: text.char_indices().map(|(i, _)| i).collect(),
        }
    }

    /// Character count of the text
    pub(crate) fn len(&self) -> usize {
        self.starts.len()
    }

    /// Character index of a byte offset that lies on a char boundary
    pub(crate) fn char_index(&self, byte: usize) -> usize {
        self.starts.binary_search(&byte).unwrap_or_else(|i| i)
    }

    pub(crate) fn span(&self, byte_start: usize, byte_end: usize) -> (usize, usize) {
        (self.char_index(byte_start), self.char_index(byte_end))
    }
}

/// Byte ranges of every match of `regex` in `text`
pub(crate) fn match_ranges(regex: &Regex, text: &str) -> Vec<(usize, usize)> {
    regex.find_iter(text).map(|m| (m.start(), m.end())).collect()
}

/// Common fields of every span an extractor emits
pub(crate) struct SpanTemplate<'a> {
    pub turn_id: &'a str,
    pub layer_id: &'static str,
    pub attribution_method_id: &'static str,
    pub extractor_version: &'static str,
    pub confidence: f64,
}

impl SpanTemplate<'_> {
    pub(crate) fn span(
        &self,
        span_id: String,
        (start, end): (usize, usize),
        score: f64,
        notes: impl Into<String>,
    ) -> EvidenceSpan {
        EvidenceSpan {
            span_id,
            turn_id: self.turn_id.to_string(),
            layer_id: self.layer_id.to_string(),
            start,
            end,
            score: score.clamp(0.0, 1.0),
            confidence: self.confidence,
            attribution_method_id: self.attribution_method_id.to_string(),
            extractor_version: self.extractor_version.to_string(),
            notes: Some(notes.into()),
        }
    }
}
