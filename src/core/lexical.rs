//! Lexical extractor: surface intensity markers
//!
//! Signals: exclamation / question marks, ALL-CAPS tokens (3+ letters),
//! runs of 3+ identical `!`, `?` or `.`.

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::extractor::{match_ranges, CharOffsets, Extractor, SpanTemplate};
use crate::types::{LayerOutput, Turn};

pub const LEXICAL_LAYER_ID: &str = "lexical";
pub const LEXICAL_VERSION: &str = "lexical_v0.1";
const ATTRIBUTION_METHOD_ID: &str = "deterministic_regex";

// =============================================================================
// SCORE WEIGHTS - per raw signal count
// =============================================================================

const W_EXCLAMATION: f64 = 0.08;
const W_QUESTION: f64 = 0.04;
const W_CAPS: f64 = 0.10;
const W_REPEAT: f64 = 0.15;

// =============================================================================
// CONFIDENCE - base + length term + signal term, floored
// =============================================================================

/// Lowest confidence ever reported, even for empty text
pub const LEXICAL_CONFIDENCE_FLOOR: f64 = 0.15;
const CONFIDENCE_BASE: f64 = 0.25;
const CONFIDENCE_PER_CHAR: f64 = 0.02;
const CONFIDENCE_CHAR_CAP: usize = 120;
const CONFIDENCE_PER_SIGNAL: f64 = 0.12;
const CONFIDENCE_SIGNAL_CAP: usize = 6;

/// Only the first few caps tokens become evidence
const MAX_CAPS_SPANS: usize = 8;
const REPEAT_SPAN_SCORE: f64 = 0.7;

lazy_static! {
    static ref RE_CAPS: Regex = Regex::new(r"\b[A-Z]{3,}\b").unwrap();
    static ref RE_REPEAT: Regex = Regex::new(r"!{3,}|\?{3,}|\.{3,}").unwrap();
}

/// Raw counts behind a lexical score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LexicalSignals {
    pub exclamations: usize,
    pub questions: usize,
    pub caps_tokens: usize,
    pub repeat_runs: usize,
}

impl LexicalSignals {
    pub fn total(&self) -> usize {
        self.exclamations + self.questions + self.caps_tokens + self.repeat_runs
    }

    pub fn score(&self) -> f64 {
        let raw = self.exclamations as f64 * W_EXCLAMATION
            + self.questions as f64 * W_QUESTION
            + self.caps_tokens as f64 * W_CAPS
            + self.repeat_runs as f64 * W_REPEAT;
        raw.clamp(0.0, 1.0)
    }

    /// Rises with text length and signal count, saturating on both
    pub fn confidence(&self, char_count: usize) -> f64 {
        let n = char_count.max(1).min(CONFIDENCE_CHAR_CAP) as f64;
        let signals = self.total().min(CONFIDENCE_SIGNAL_CAP) as f64;
        (CONFIDENCE_BASE + CONFIDENCE_PER_CHAR * n + CONFIDENCE_PER_SIGNAL * signals)
            .clamp(LEXICAL_CONFIDENCE_FLOOR, 1.0)
    }
}

/// Lexical layer extractor
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalExtractor;

impl LexicalExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Count signals without building evidence
    pub fn signals(&self, text: &str) -> LexicalSignals {
        LexicalSignals {
            exclamations: text.matches('!').count(),
            questions: text.matches('?').count(),
            caps_tokens: RE_CAPS.find_iter(text).count(),
            repeat_runs: RE_REPEAT.find_iter(text).count(),
        }
    }
}

impl Extractor for LexicalExtractor {
    fn layer_id(&self) -> &'static str {
        LEXICAL_LAYER_ID
    }

    fn version(&self) -> &'static str {
        LEXICAL_VERSION
    }

    fn extract(&self, turn: &Turn) -> LayerOutput {
        let text = turn.text.as_str();
        let offsets = CharOffsets::new(text);

        let signals = self.signals(text);
        let score = signals.score();
        let confidence = signals.confidence(offsets.len());

        let template = SpanTemplate {
            turn_id: &turn.turn_id,
            layer_id: LEXICAL_LAYER_ID,
            attribution_method_id: ATTRIBUTION_METHOD_ID,
            extractor_version: LEXICAL_VERSION,
            confidence,
        };

        let mut evidence = Vec::new();

        for (bs, be) in match_ranges(&RE_CAPS, text).into_iter().take(MAX_CAPS_SPANS) {
            let (start, end) = offsets.span(bs, be);
            let span_score = 0.6 + 0.05 * (end - start) as f64;
            evidence.push(template.span(
                format!("{}:lex:caps:{}", turn.turn_id, start),
                (start, end),
                span_score,
                "ALLCAPS token",
            ));
        }

        for (bs, be) in match_ranges(&RE_REPEAT, text) {
            let (start, end) = offsets.span(bs, be);
            evidence.push(template.span(
                format!("{}:lex:repeat:{}", turn.turn_id, start),
                (start, end),
                REPEAT_SPAN_SCORE,
                "Repeated punctuation",
            ));
        }

        LayerOutput {
            layer_id: LEXICAL_LAYER_ID.to_string(),
            score,
            confidence,
            evidence,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(text: &str) -> Turn {
        Turn::new("t1", "npc1", "main", text)
    }

    #[test]
    fn test_empty_input() {
        let out = LexicalExtractor::new().extract(&turn(""));
        assert_eq!(out.score, 0.0);
        assert!(out.confidence >= LEXICAL_CONFIDENCE_FLOOR);
        assert!(out.confidence < 1.0);
        assert!(out.evidence.is_empty());
    }

    #[test]
    fn test_caps_and_repeat_spans() {
        let text = "STOP now!!!";
        let out = LexicalExtractor::new().extract(&turn(text));

        let caps = out.evidence.iter().find(|s| s.notes.as_deref() == Some("ALLCAPS token")).unwrap();
        assert_eq!((caps.start, caps.end), (0, 4));
        assert_eq!(caps.slice(text), Some("STOP"));

        let run = out.evidence.iter().find(|s| s.notes.as_deref() == Some("Repeated punctuation")).unwrap();
        assert_eq!((run.start, run.end), (8, 11));
        assert_eq!(run.slice(text), Some("!!!"));
        assert_eq!(run.score, REPEAT_SPAN_SCORE);
    }

    #[test]
    fn test_score_from_counts() {
        // 3 '!', one caps token (NOW), one run
        let out = LexicalExtractor::new().extract(&turn("DO IT NOW!!! or else"));
        assert!((out.score - 0.49).abs() < 1e-9, "got {}", out.score);
        assert_eq!(out.confidence, 1.0);
    }

    #[test]
    fn test_short_tokens_are_not_caps() {
        let signals = LexicalExtractor::new().signals("OK GO NOW");
        assert_eq!(signals.caps_tokens, 1);
    }

    #[test]
    fn test_mixed_runs_counted_separately() {
        let signals = LexicalExtractor::new().signals("what!!!???");
        assert_eq!(signals.repeat_runs, 2);
        assert_eq!(signals.exclamations, 3);
        assert_eq!(signals.questions, 3);
    }

    #[test]
    fn test_score_clamped() {
        let out = LexicalExtractor::new().extract(&turn("WHY WHY WHY WHY!!!!!!!!!! ??? ..."));
        assert_eq!(out.score, 1.0);
    }

    #[test]
    fn test_caps_spans_capped() {
        let text = "AAA BBB CCC DDD EEE FFF GGG HHH III JJJ";
        let out = LexicalExtractor::new().extract(&turn(text));
        assert_eq!(out.evidence.len(), MAX_CAPS_SPANS);
    }

    #[test]
    fn test_repeated_caps_word_gets_distinct_spans() {
        let text = "NOW and NOW";
        let out = LexicalExtractor::new().extract(&turn(text));
        let starts: Vec<usize> = out.evidence.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0, 8]);
    }

    #[test]
    fn test_multibyte_offsets_are_chars() {
        let text = "ça NOW";
        let out = LexicalExtractor::new().extract(&turn(text));
        assert_eq!((out.evidence[0].start, out.evidence[0].end), (3, 6));
        assert_eq!(out.evidence[0].slice(text), Some("NOW"));
    }

    #[test]
    fn test_confidence_increases_with_length() {
        let ex = LexicalExtractor::new();
        let short = ex.extract(&turn("hi"));
        let long = ex.extract(&turn("hello there, this is a somewhat longer sentence"));
        assert!(long.confidence > short.confidence);
    }

    #[test]
    fn test_determinism() {
        let ex = LexicalExtractor::new();
        let t = turn("WHAT is going on?!");
        assert_eq!(ex.extract(&t), ex.extract(&t));
    }
}
