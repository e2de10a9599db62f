//! Deviation events: the unit persisted downstream

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{EvidenceSpan, RoutingDecision, ScopeKey};

/// One output per (turn, scope). Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationEvent {
    pub event_id: String,
    pub ts: f64,

    pub scope_key: ScopeKey,
    pub enter: bool,
    pub exit: bool,
    pub active: bool,

    /// Instantaneous severity in [0, 1)
    pub severity: f64,
    /// Smoothed severity after this turn
    pub ema_severity: f64,
    pub confidence: f64,

    /// Normalized distance from baseline, per layer
    pub deviation_vector: BTreeMap<String, f64>,
    pub dominant_layers: Vec<String>,

    // provenance
    pub manifest_version: String,
    pub baseline_family_id: String,
    pub parameter_version: String,
    pub baseline_hash: String,
    pub extractor_versions: BTreeMap<String, String>,

    pub evidence: Vec<EvidenceSpan>,

    pub decision: RoutingDecision,

    // references
    pub turn_id: String,
    pub speaker_id: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<String>,
}

/// A scope whose baseline could not be resolved this turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFailure {
    pub scope_key: ScopeKey,
    /// Machine-readable error tag (`config_not_found`, `config_invalid`, ...)
    pub code: String,
    pub message: String,
}

/// Everything one turn produced, scope failures isolated from successes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    /// Events in scope-set order
    pub events: Vec<DeviationEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ScopeFailure>,
}

impl TurnOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
