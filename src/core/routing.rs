//! Routing policy: (severity, confidence, active) → gating decision
//!
//! Gate levels: 0 normal, 1 soft review / dampen, 2 hard gate.
//! Inactive scopes are never gated. For active scopes confidence is
//! checked before severity.

use crate::types::{DecisionNote, GateLevel, RoutingDecision, RoutingThresholds};

/// Pure routing decision for one scope
pub fn route(
    severity: f64,
    confidence: f64,
    active: bool,
    thresholds: &RoutingThresholds,
) -> RoutingDecision {
    if !active {
        return RoutingDecision::pass();
    }

    if confidence < thresholds.min_confidence_for_action {
        return RoutingDecision::new(false, true, GateLevel::Dampen)
            .with_note(DecisionNote::LowConfidence);
    }

    // highest tier reached wins: quarantine > freeze > review
    if severity >= thresholds.quarantine_at {
        RoutingDecision::new(true, true, GateLevel::Freeze)
    } else if severity >= thresholds.freeze_at {
        RoutingDecision::new(false, true, GateLevel::Freeze)
    } else if severity >= thresholds.review_at {
        RoutingDecision::new(false, true, GateLevel::Dampen)
    } else {
        RoutingDecision::new(false, false, GateLevel::Dampen)
    }
}

// =============================================================================
// TESTS
// =============================================================================
