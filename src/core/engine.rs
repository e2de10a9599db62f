//! Deviation engine: runs one turn through every scope
//!
//! Per turn:
//! 1. every extractor runs once (scope-independent)
//! 2. per scope: resolve baseline → assess → step hysteresis → route → event
//!
//! The engine owns its scope-state table. It is not meant to be shared
//! across concurrent turns touching the same scopes without a lock; use
//! one engine per session.

use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::baseline::{BaselineResolver, ResolvedBaseline};
use crate::core::deviation::assess;
use crate::core::extractor::Extractor;
use crate::core::hysteresis::HysteresisTable;
use crate::core::lexical::LexicalExtractor;
use crate::core::pragmatic::PragmaticExtractor;
use crate::core::rationale::{collect_evidence, dominant_layers};
use crate::core::routing::route;
use crate::error::Result;
use crate::types::{
    DeviationEvent, LayerOutput, ScopeFailure, ScopeKey, ScopeState, Turn, TurnOutcome,
};
use crate::DOMINANT_LAYERS_TOP_N;

/// Orchestrator for one processing context (session)
pub struct DeviationEngine {
    resolver: BaselineResolver,
    extractors: Vec<Box<dyn Extractor>>,
    table: HysteresisTable,
}

impl std::fmt::Debug for DeviationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviationEngine")
            .field("resolver", &self.resolver)
            .field("extractors", &self.extractor_versions())
            .field("table", &self.table)
            .finish()
    }
}

impl DeviationEngine {
    /// Engine with the lexical and pragmatic extractors registered
    pub fn new(resolver: BaselineResolver) -> Self {
        Self {
            resolver,
            extractors: vec![Box::new(LexicalExtractor::new()), Box::new(PragmaticExtractor::new())],
            table: HysteresisTable::new(),
        }
    }

    /// Engine reading baselines from `manifests_dir`, no cache
    pub fn from_dir(manifests_dir: impl Into<PathBuf>) -> Self {
        Self::new(BaselineResolver::new(manifests_dir))
    }

    /// Engine with no extractors; register them with [`Self::with_extractor`]
    pub fn bare(resolver: BaselineResolver) -> Self {
        Self {
            resolver,
            extractors: Vec::new(),
            table: HysteresisTable::new(),
        }
    }

    /// Register another extractor family; runs after those already present
    pub fn with_extractor(mut self, extractor: impl Extractor + 'static) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    /// Layer id → version tag of every registered extractor
    pub fn extractor_versions(&self) -> BTreeMap<String, String> {
        self.extractors
            .iter()
            .map(|e| (e.layer_id().to_string(), e.version().to_string()))
            .collect()
    }

    /// Run every extractor once
    pub fn extract(&self, turn: &Turn) -> Vec<LayerOutput> {
        self.extractors.iter().map(|e| e.extract(turn)).collect()
    }

    pub fn resolver(&self) -> &BaselineResolver {
        &self.resolver
    }

    /// Current state of a scope, if it has been observed
    pub fn scope_state(&self, scope: &ScopeKey) -> Option<ScopeState> {
        self.table.get(scope)
    }

    /// All observed scope states, ordered by key
    pub fn scope_states(&self) -> Vec<(ScopeKey, ScopeState)> {
        self.table.snapshot()
    }

    /// Process one turn. Scope failures are isolated: a scope whose
    /// baseline cannot be resolved is reported in `failures`, does not
    /// step its state, and does not stop the other scopes.
    ///
    /// `scopes` overrides [`Turn::default_scopes`] when given and non-empty.
    pub fn process_turn(&mut self, turn: &Turn, scopes: Option<&[ScopeKey]>) -> Result<TurnOutcome> {
        turn.validate()?;
        let scopes = scopes_for(turn, scopes);

        let layers = self.extract(turn);
        let versions = self.extractor_versions();

        let mut outcome = TurnOutcome::default();
        for scope in &scopes {
            match self.resolver.resolve(scope) {
                Ok(baseline) => {
                    let event = self.evaluate_scope(turn, scope, &baseline, &layers, &versions);
                    outcome.events.push(event);
                }
                Err(err) => {
                    warn!(turn_id = %turn.turn_id, scope = %scope, error = %err, "scope skipped");
                    outcome.failures.push(ScopeFailure {
                        scope_key: scope.clone(),
                        code: err.code().to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }
        Ok(outcome)
    }

    /// Fail-fast variant: the first scope that fails to resolve aborts the
    /// turn before any scope state is touched
    pub fn process_turn_strict(
        &mut self,
        turn: &Turn,
        scopes: Option<&[ScopeKey]>,
    ) -> Result<Vec<DeviationEvent>> {
        turn.validate()?;
        let scopes = scopes_for(turn, scopes);

        let baselines = scopes
            .iter()
            .map(|scope| self.resolver.resolve(scope))
            .collect::<Result<Vec<_>>>()?;

        let layers = self.extract(turn);
        let versions = self.extractor_versions();

        Ok(scopes
            .iter()
            .zip(baselines.iter())
            .map(|(scope, baseline)| self.evaluate_scope(turn, scope, baseline, &layers, &versions))
            .collect())
    }

    fn evaluate_scope(
        &mut self,
        turn: &Turn,
        scope: &ScopeKey,
        baseline: &ResolvedBaseline,
        layers: &[LayerOutput],
        versions: &BTreeMap<String, String>,
    ) -> DeviationEvent {
        let config = &baseline.config;

        let assessment = assess(config, layers);
        let step = self.table.step(scope, assessment.severity, config.hysteresis());
        let decision = route(
            assessment.severity,
            assessment.confidence,
            step.state.active,
            &config.routing_thresholds(),
        );

        debug!(
            turn_id = %turn.turn_id,
            scope = %scope,
            severity = assessment.severity,
            ema = step.state.ema,
            confidence = assessment.confidence,
            failed_closed = assessment.failed_closed,
            "scope stepped"
        );
        if step.transition.is_enter() || step.transition.is_exit() {
            info!(
                turn_id = %turn.turn_id,
                scope = %scope,
                transition = %step.transition,
                ema = step.state.ema,
                gate = decision.gate_level.level(),
                "scope transition"
            );
        }

        DeviationEvent {
            event_id: Uuid::new_v4().to_string(),
            ts: turn.ts,
            scope_key: scope.clone(),
            enter: step.transition.is_enter(),
            exit: step.transition.is_exit(),
            active: step.state.active,
            severity: assessment.severity,
            ema_severity: step.state.ema,
            confidence: assessment.confidence,
            dominant_layers: dominant_layers(&assessment.vector.deviation, DOMINANT_LAYERS_TOP_N),
            deviation_vector: assessment.vector.deviation,
            manifest_version: config.manifest_version.clone(),
            baseline_family_id: config.baseline_family_id.clone(),
            parameter_version: config.parameter_version.clone(),
            baseline_hash: baseline.fingerprint.clone(),
            extractor_versions: versions.clone(),
            evidence: collect_evidence(layers),
            decision,
            turn_id: turn.turn_id.clone(),
            speaker_id: turn.speaker_id.clone(),
            channel_id: turn.channel_id.clone(),
            task_id: turn.task_id.clone(),
            scene_id: turn.scene_id.clone(),
        }
    }
}

/// Explicit scopes, or the turn's defaults when none (or an empty list) are given
fn scopes_for(turn: &Turn, scopes: Option<&[ScopeKey]>) -> Vec<ScopeKey> {
    match scopes {
        Some(scopes) if !scopes.is_empty() => scopes.to_vec(),
        _ => turn.default_scopes(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DecisionNote, GateLevel};
    use tempfile::TempDir;

    const GLOBAL: &str = r#"{
        "manifest_version": "m1",
        "baseline_family_id": "global_fam",
        "parameter_version": "p1",
        "ema_beta": 0.5,
        "theta_enter": 0.6,
        "alpha_exit": 0.5,
        "layer_weights": {"lexical": 0.5, "pragmatic": 0.5},
        "baselines": {
            "lexical": {"mu": 0.05, "sigma": 0.15},
            "pragmatic": {"mu": 0.03, "sigma": 0.12}
        }
    }"#;

    fn engine_with(files: &[(&str, &str)]) -> (TempDir, DeviationEngine) {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in files {
            std::fs::write(dir.path().join(name), body).unwrap();
        }
        let engine = DeviationEngine::from_dir(dir.path());
        (dir, engine)
    }

    /// Fixed-output extractor for driving the engine with exact scores
    struct Fixed(&'static str, f64);

    impl Extractor for Fixed {
        fn layer_id(&self) -> &'static str {
            self.0
        }
        fn version(&self) -> &'static str {
            "fixed_v1"
        }
        fn extract(&self, _turn: &Turn) -> LayerOutput {
            LayerOutput {
                layer_id: self.0.to_string(),
                score: self.1,
                confidence: 0.9,
                evidence: vec![],
            }
        }
    }

    #[test]
    fn test_default_scope_order() {
        let (_dir, mut engine) = engine_with(&[("global.json", GLOBAL)]);
        let turn = Turn::new("t1", "npc1", "main", "hello").with_task("T1").with_scene("S1");
        let outcome = engine.process_turn(&turn, None).unwrap();
        let keys: Vec<String> = outcome.events.iter().map(|e| e.scope_key.to_string()).collect();
        assert_eq!(keys, vec!["global", "agent:npc1", "task:T1", "scene:S1"]);
        assert!(outcome.is_complete());
    }

    #[test]
    fn test_explicit_scopes_override() {
        let (_dir, mut engine) = engine_with(&[("global.json", GLOBAL)]);
        let turn = Turn::new("t1", "npc1", "main", "hello");
        let scopes = [ScopeKey::Scene("S9".into())];
        let outcome = engine.process_turn(&turn, Some(&scopes)).unwrap();
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].scope_key, ScopeKey::Scene("S9".into()));
    }

    #[test]
    fn test_provenance_and_evidence() {
        let (_dir, mut engine) = engine_with(&[("global.json", GLOBAL)]);
        let turn = Turn::new("t1", "npc1", "main", "STOP now!!!");
        let outcome = engine.process_turn(&turn, None).unwrap();
        let event = &outcome.events[0];

        assert_eq!(event.manifest_version, "m1");
        assert_eq!(event.baseline_family_id, "global_fam");
        assert_eq!(event.parameter_version, "p1");
        assert_eq!(event.baseline_hash, crate::core::baseline::fingerprint(GLOBAL.as_bytes()));
        assert_eq!(event.extractor_versions["lexical"], "lexical_v0.1");
        assert_eq!(event.extractor_versions["pragmatic"], "pragmatic_v0.1");
        assert!(!event.evidence.is_empty());
        assert_eq!(event.evidence[0].layer_id, "lexical");
        assert_eq!(event.dominant_layers.len(), 2);
        assert_eq!(event.turn_id, "t1");
        assert_eq!(event.speaker_id, "npc1");
    }

    #[test]
    fn test_events_share_extraction_but_not_ids() {
        let (_dir, mut engine) = engine_with(&[("global.json", GLOBAL)]);
        let turn = Turn::new("t1", "npc1", "main", "you must stop");
        let outcome = engine.process_turn(&turn, None).unwrap();
        assert_eq!(outcome.events[0].evidence, outcome.events[1].evidence);
        assert_ne!(outcome.events[0].event_id, outcome.events[1].event_id);
    }

    #[test]
    fn test_hysteresis_through_engine() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = r#"{
            "manifest_version": "m1", "baseline_family_id": "f", "parameter_version": "p",
            "ema_beta": 0.5, "theta_enter": 0.6, "alpha_exit": 0.5,
            "layer_weights": {"x": 1.0},
            "baselines": {"x": {"mu": 0.0, "sigma": 1.0}}
        }"#;
        std::fs::write(dir.path().join("global.json"), cfg).unwrap();

        // deviation 3.0 gives severity 1 - e^-9, close to 1
        let mut engine = DeviationEngine::bare(BaselineResolver::new(dir.path())).with_extractor(Fixed("x", 3.0));
        let turn = Turn::new("t1", "npc1", "main", "");
        let scopes = [ScopeKey::Global];

        let first = engine.process_turn_strict(&turn, Some(&scopes)).unwrap();
        assert!(!first[0].active);
        let second = engine.process_turn_strict(&turn, Some(&scopes)).unwrap();
        assert!(second[0].enter);
        assert!(second[0].active);
        assert_eq!(second[0].decision.gate_level, GateLevel::Freeze);
        assert!(second[0].decision.quarantine);
        assert_eq!(engine.scope_state(&ScopeKey::Global).unwrap().observations, 2);
    }

    #[test]
    fn test_partial_failure_isolated() {
        let (dir, mut engine) = engine_with(&[("global.json", GLOBAL)]);
        std::fs::write(dir.path().join("task.json"), "{ broken").unwrap();

        let turn = Turn::new("t1", "npc1", "main", "hello").with_task("T1");
        let outcome = engine.process_turn(&turn, None).unwrap();

        assert_eq!(outcome.events.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].scope_key, ScopeKey::Task("T1".into()));
        assert_eq!(outcome.failures[0].code, "config_invalid");
        assert!(engine.scope_state(&ScopeKey::Task("T1".into())).is_none());
        assert!(engine.scope_state(&ScopeKey::Global).is_some());
    }

    #[test]
    fn test_strict_fails_before_stepping() {
        let (dir, mut engine) = engine_with(&[("global.json", GLOBAL)]);
        std::fs::write(dir.path().join("task.json"), "{ broken").unwrap();

        let turn = Turn::new("t1", "npc1", "main", "hello").with_task("T1");
        assert!(engine.process_turn_strict(&turn, None).is_err());
        assert!(engine.scope_states().is_empty());
    }

    #[test]
    fn test_missing_global_reports_not_found() {
        let (_dir, mut engine) = engine_with(&[]);
        let turn = Turn::new("t1", "npc1", "main", "hello");
        let outcome = engine.process_turn(&turn, None).unwrap();
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.failures.len(), 2);
        assert!(outcome.failures.iter().all(|f| f.code == "config_not_found"));
    }

    #[test]
    fn test_invalid_turn_rejected() {
        let (_dir, mut engine) = engine_with(&[("global.json", GLOBAL)]);
        let turn = Turn::new("t1", "", "main", "hello");
        let err = engine.process_turn(&turn, None).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_registered_extractor_in_provenance() {
        let (_dir, engine) = engine_with(&[("global.json", GLOBAL)]);
        let engine = engine.with_extractor(Fixed("prosody", 0.1));
        let versions = engine.extractor_versions();
        assert_eq!(versions.len(), 3);
        assert_eq!(versions["prosody"], "fixed_v1");
    }

    #[test]
    fn test_fail_closed_routes_to_low_confidence_review() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = r#"{
            "manifest_version": "m1", "baseline_family_id": "f", "parameter_version": "p",
            "ema_beta": 0.5, "theta_enter": 0.6, "alpha_exit": 0.5,
            "missing_layer_policy": "fail_closed",
            "layer_weights": {"x": 0.5, "y": 0.5},
            "baselines": {"x": {"mu": 0.0, "sigma": 1.0}, "y": {"mu": 0.0, "sigma": 1.0}}
        }"#;
        std::fs::write(dir.path().join("global.json"), cfg).unwrap();

        // "y" never produces output, and "x" sits exactly on its baseline
        let mut engine = DeviationEngine::bare(BaselineResolver::new(dir.path())).with_extractor(Fixed("x", 0.0));
        let turn = Turn::new("t1", "npc1", "main", "");
        let scopes = [ScopeKey::Global];

        let first = engine.process_turn(&turn, Some(&scopes)).unwrap();
        assert_eq!(first.events[0].severity, 1.0);
        assert_eq!(first.events[0].confidence, 0.0);
        assert!(!first.events[0].active);

        let second = engine.process_turn(&turn, Some(&scopes)).unwrap();
        let event = &second.events[0];
        assert!(event.enter);
        assert!(event.active);
        assert!(!event.decision.quarantine);
        assert!(event.decision.review);
        assert_eq!(event.decision.gate_level, GateLevel::Dampen);
        assert_eq!(event.decision.note, Some(DecisionNote::LowConfidence));
    }

    #[test]
    fn test_empty_scope_override_uses_defaults() {
        let (_dir, mut engine) = engine_with(&[("global.json", GLOBAL)]);
        let turn = Turn::new("t1", "npc1", "main", "hello").with_task("T1");
        let empty: &[ScopeKey] = &[];
        let outcome = engine.process_turn(&turn, Some(empty)).unwrap();
        let keys: Vec<String> = outcome.events.iter().map(|e| e.scope_key.to_string()).collect();
        assert_eq!(keys, vec!["global", "agent:npc1", "task:T1"]);

        let events = engine.process_turn_strict(&turn, Some(empty)).unwrap();
        assert_eq!(events.len(), 3);
    }
}
