//! Batch replay of recorded turns and per-scope summaries

use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::core::audit::AuditLog;
use crate::core::engine::DeviationEngine;
use crate::error::{CdeError, Result};
use crate::types::{DeviationEvent, LastSnapshot, ScopeFailure, ScopeSummary, Turn};

/// Events and scope failures of a whole replay
#[derive(Debug, Clone, Default)]
pub struct ReplayRun {
    pub events: Vec<DeviationEvent>,
    pub failures: Vec<ScopeFailure>,
    pub turns: usize,
}

/// Read JSONL turns; blank lines are skipped, missing `ts` is filled
/// with the current time. Line numbers are 1-based in errors.
pub fn load_turns(path: impl AsRef<Path>) -> Result<Vec<Turn>> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    parse_turns(&raw)
}

/// Same as [`load_turns`] over an in-memory buffer
pub fn parse_turns(raw: &str) -> Result<Vec<Turn>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            Turn::from_json(line.trim()).map_err(|e| match e {
                CdeError::InputInvalid(msg) => {
                    CdeError::input_invalid(format!("line {}: {}", i + 1, msg))
                }
                other => other,
            })
        })
        .collect()
}

/// Process every turn with default scopes, appending each event to `audit`
pub fn run_turns(engine: &mut DeviationEngine, audit: Option<&AuditLog>, turns: &[Turn]) -> Result<ReplayRun> {
    let mut run = ReplayRun::default();
    for turn in turns {
        let outcome = engine.process_turn(turn, None)?;
        if let Some(audit) = audit {
            for event in &outcome.events {
                audit.append(event)?;
            }
        }
        run.events.extend(outcome.events);
        run.failures.extend(outcome.failures);
        run.turns += 1;
    }
    info!(turns = run.turns, events = run.events.len(), failures = run.failures.len(), "replay complete");
    Ok(run)
}

/// Load a JSONL file and replay it
pub fn run_file(engine: &mut DeviationEngine, audit: Option<&AuditLog>, path: impl AsRef<Path>) -> Result<ReplayRun> {
    let turns = load_turns(path)?;
    run_turns(engine, audit, &turns)
}

fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}

/// Per-scope story: peaks, first enter, last exit, last observed state
pub fn summarize(events: &[DeviationEvent]) -> BTreeMap<String, ScopeSummary> {
    let mut by_scope: BTreeMap<String, ScopeSummary> = BTreeMap::new();

    for e in events {
        let s = by_scope.entry(e.scope_key.to_string()).or_default();

        s.peak_severity = s.peak_severity.max(e.severity);
        s.peak_ema = s.peak_ema.max(e.ema_severity);

        if e.enter && s.first_enter_turn.is_none() {
            s.first_enter_turn = Some(e.turn_id.clone());
            s.first_enter_ts = Some(e.ts);
        }
        if e.exit {
            s.last_exit_turn = Some(e.turn_id.clone());
            s.last_exit_ts = Some(e.ts);
        }

        s.last = Some(LastSnapshot {
            active: e.active,
            ema_severity: e.ema_severity,
            severity: e.severity,
            confidence: e.confidence,
            dominant_layers: e.dominant_layers.clone(),
            decision: e.decision,
            turn_id: e.turn_id.clone(),
        });
    }

    for s in by_scope.values_mut() {
        s.peak_severity = round6(s.peak_severity);
        s.peak_ema = round6(s.peak_ema);
    }
    by_scope
}
