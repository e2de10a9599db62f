//! Top-event selection across the scopes of one turn

use crate::types::{DeviationEvent, RoutingDecision, TurnOutcome, TurnReport};

/// Event to surface for a turn: highest scope priority
/// (scene > task > agent > global), then highest severity.
/// Full ties keep the earliest event in scope order.
pub fn select_top_event(events: &[DeviationEvent]) -> Option<&DeviationEvent> {
    let mut best: Option<&DeviationEvent> = None;
    for event in events {
        let better = match best {
            None => true,
            Some(current) => {
                let p = event.scope_key.priority();
                let cp = current.scope_key.priority();
                p > cp || (p == cp && event.severity > current.severity)
            }
        };
        if better {
            best = Some(event);
        }
    }
    best
}

impl TurnReport {
    /// Boundary report for a processed turn
    pub fn from_outcome(outcome: TurnOutcome) -> Self {
        let top_event = select_top_event(&outcome.events).cloned();
        Self {
            decision: top_event
                .as_ref()
                .map(|e| e.decision)
                .unwrap_or_else(RoutingDecision::pass),
            baseline_hash: top_event.as_ref().map(|e| e.baseline_hash.clone()),
            extractor_versions: top_event.as_ref().map(|e| e.extractor_versions.clone()),
            top_event,
            events: outcome.events,
            failures: outcome.failures,
        }
    }
}
