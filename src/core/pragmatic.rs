//! Pragmatic extractor: demands and ultimatums
//!
//! Case-insensitive, word-bounded phrase rules. Ultimatums weigh more
//! than plain demands.

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::extractor::{match_ranges, CharOffsets, Extractor, SpanTemplate};
use crate::types::{LayerOutput, Turn};

pub const PRAGMATIC_LAYER_ID: &str = "pragmatic";
pub const PRAGMATIC_VERSION: &str = "pragmatic_v0.1";
const ATTRIBUTION_METHOD_ID: &str = "deterministic_phrase_rules";

/// Demand / command markers
pub const DEMAND_PHRASES: &[&str] = &[
    "do it now",
    "immediately",
    "right now",
    "you need to",
    "you must",
    "no excuses",
    "stop",
    "not asking",
];

/// Ultimatum markers
pub const ULTIMATUM_PHRASES: &[&str] = &["or else", "if you don't", "last chance"];

const W_DEMAND: f64 = 0.12;
const W_ULTIMATUM: f64 = 0.22;

/// Lowest confidence ever reported, even for empty text
pub const PRAGMATIC_CONFIDENCE_FLOOR: f64 = 0.20;
const CONFIDENCE_BASE: f64 = 0.35;
const CONFIDENCE_PER_DEMAND: f64 = 0.10;
const CONFIDENCE_DEMAND_CAP: usize = 4;
const CONFIDENCE_PER_ULTIMATUM: f64 = 0.15;
const CONFIDENCE_ULTIMATUM_CAP: usize = 3;
const CONFIDENCE_PER_CHAR: f64 = 0.01;
const CONFIDENCE_CHAR_CAP: usize = 100;

const MAX_SPANS_PER_KIND: usize = 10;
const DEMAND_SPAN_SCORE: f64 = 0.55;
const ULTIMATUM_SPAN_SCORE: f64 = 0.75;

lazy_static! {
    static ref RE_DEMANDS: Vec<Regex> = DEMAND_PHRASES.iter().map(|p| phrase_regex(p)).collect();
    static ref RE_ULTIMATUMS: Vec<Regex> = ULTIMATUM_PHRASES.iter().map(|p| phrase_regex(p)).collect();
}

fn phrase_regex(phrase: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(phrase))).unwrap()
}

/// One phrase match, byte offsets into the original text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PhraseHit {
    start: usize,
    end: usize,
    /// Index into the phrase table it came from
    phrase: usize,
}

/// All matches, grouped by phrase in table order
fn find_hits(patterns: &[Regex], text: &str) -> Vec<PhraseHit> {
    patterns
        .iter()
        .enumerate()
        .flat_map(|(phrase, re)| {
            match_ranges(re, text)
                .into_iter()
                .map(move |(start, end)| PhraseHit { start, end, phrase })
        })
        .collect()
}

/// Pragmatic layer extractor
#[derive(Debug, Default, Clone, Copy)]
pub struct PragmaticExtractor;

impl PragmaticExtractor {
    pub fn new() -> Self {
        Self
    }

    /// (demand hits, ultimatum hits)
    pub fn counts(&self, text: &str) -> (usize, usize) {
        (
            find_hits(&RE_DEMANDS, text).len(),
            find_hits(&RE_ULTIMATUMS, text).len(),
        )
    }
}

fn score(demands: usize, ultimatums: usize) -> f64 {
    (W_DEMAND * demands as f64 + W_ULTIMATUM * ultimatums as f64).clamp(0.0, 1.0)
}

fn confidence(demands: usize, ultimatums: usize, char_count: usize) -> f64 {
    let n = char_count.max(1).min(CONFIDENCE_CHAR_CAP) as f64;
    (CONFIDENCE_BASE
        + CONFIDENCE_PER_DEMAND * demands.min(CONFIDENCE_DEMAND_CAP) as f64
        + CONFIDENCE_PER_ULTIMATUM * ultimatums.min(CONFIDENCE_ULTIMATUM_CAP) as f64
        + CONFIDENCE_PER_CHAR * n)
        .clamp(PRAGMATIC_CONFIDENCE_FLOOR, 1.0)
}

impl Extractor for PragmaticExtractor {
    fn layer_id(&self) -> &'static str {
        PRAGMATIC_LAYER_ID
    }

    fn version(&self) -> &'static str {
        PRAGMATIC_VERSION
    }

    fn extract(&self, turn: &Turn) -> LayerOutput {
        let text = turn.text.as_str();
        let offsets = CharOffsets::new(text);

        let demands = find_hits(&RE_DEMANDS, text);
        let ultimatums = find_hits(&RE_ULTIMATUMS, text);

        let score = score(demands.len(), ultimatums.len());
        let confidence = confidence(demands.len(), ultimatums.len(), offsets.len());

        let template = SpanTemplate {
            turn_id: &turn.turn_id,
            layer_id: PRAGMATIC_LAYER_ID,
            attribution_method_id: ATTRIBUTION_METHOD_ID,
            extractor_version: PRAGMATIC_VERSION,
            confidence,
        };

        let demand_spans = demands.iter().take(MAX_SPANS_PER_KIND).map(|hit| {
            let (start, end) = offsets.span(hit.start, hit.end);
            template.span(
                format!("{}:prag:d{}:{}", turn.turn_id, hit.phrase, start),
                (start, end),
                DEMAND_SPAN_SCORE,
                format!("Matched: {}", DEMAND_PHRASES[hit.phrase]),
            )
        });
        let ultimatum_spans = ultimatums.iter().take(MAX_SPANS_PER_KIND).map(|hit| {
            let (start, end) = offsets.span(hit.start, hit.end);
            template.span(
                format!("{}:prag:u{}:{}", turn.turn_id, hit.phrase, start),
                (start, end),
                ULTIMATUM_SPAN_SCORE,
                format!("Matched: {}", ULTIMATUM_PHRASES[hit.phrase]),
            )
        });
        let evidence = demand_spans.chain(ultimatum_spans).collect();

        LayerOutput {
            layer_id: PRAGMATIC_LAYER_ID.to_string(),
            score,
            confidence,
            evidence,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
