//! Scope state machine: EMA smoothing with enter/exit hysteresis
//!
//! Transitions:
//! - inactive → active: ema ≥ theta_enter
//! - active → inactive: ema ≤ theta_exit
//! - otherwise unchanged
//!
//! At most one of {enter, exit} per step. Thresholds are passed on every
//! step and never touch the accumulated ema.

use std::collections::HashMap;

use crate::types::{HysteresisParams, ScopeKey, ScopeState, Transition};

impl ScopeState {
    /// Pure transition: returns the next snapshot and what changed.
    /// `ema ← (1 − beta)·severity + beta·ema_prev`
    pub fn advance(&self, severity: f64, params: HysteresisParams) -> (ScopeState, Transition) {
        let ema = (1.0 - params.beta) * severity + params.beta * self.ema;

        let (active, transition) = if !self.active && ema >= params.theta_enter {
            (true, Transition::Enter)
        } else if self.active && ema <= params.theta_exit {
            (false, Transition::Exit)
        } else {
            (self.active, Transition::None)
        };

        let next = ScopeState {
            ema,
            active,
            observations: self.observations + 1,
        };
        (next, transition)
    }
}

/// Result of stepping one scope
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub state: ScopeState,
    pub transition: Transition,
}

/// Per-scope state table owned by one engine.
/// States are created on first observation and never evicted.
#[derive(Debug, Default)]
pub struct HysteresisTable {
    states: HashMap<ScopeKey, ScopeState>,
}

impl HysteresisTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance one scope and write the snapshot back.
    /// A scope seen for the first time starts from ema = 0, inactive.
    pub fn step(&mut self, scope: &ScopeKey, severity: f64, params: HysteresisParams) -> StepOutcome {
        let prev = self.states.get(scope).copied().unwrap_or_default();
        let (state, transition) = prev.advance(severity, params);
        self.states.insert(scope.clone(), state);
        StepOutcome { state, transition }
    }

    /// Current state of a scope, if it has been observed
    pub fn get(&self, scope: &ScopeKey) -> Option<ScopeState> {
        self.states.get(scope).copied()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// All scope states, ordered by scope key
    pub fn snapshot(&self) -> Vec<(ScopeKey, ScopeState)> {
        let mut all: Vec<_> = self.states.iter().map(|(k, s)| (k.clone(), *s)).collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

// =============================================================================
// TESTS
// =============================================================================
