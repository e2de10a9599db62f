//! Boundary-facing shapes: per-turn report and per-scope replay summary

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{DeviationEvent, RoutingDecision, ScopeFailure};

/// What the CLI and HTTP boundary emit for one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnReport {
    pub events: Vec<DeviationEvent>,
    pub top_event: Option<DeviationEvent>,
    /// Decision of the top event, pass when there is none
    pub decision: RoutingDecision,
    pub baseline_hash: Option<String>,
    pub extractor_versions: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ScopeFailure>,
}

/// Last observed state of a scope during a replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastSnapshot {
    pub active: bool,
    pub ema_severity: f64,
    pub severity: f64,
    pub confidence: f64,
    pub dominant_layers: Vec<String>,
    pub decision: RoutingDecision,
    pub turn_id: String,
}

/// Compact per-scope story of a replay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeSummary {
    pub peak_severity: f64,
    pub peak_ema: f64,
    pub first_enter_turn: Option<String>,
    pub first_enter_ts: Option<f64>,
    pub last_exit_turn: Option<String>,
    pub last_exit_ts: Option<f64>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub last: Option<LastSnapshot>,
}
