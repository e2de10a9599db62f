//! Deviation aggregation: layer scores → deviation vector → severity / confidence
//!
//! Severity squashes the weighted squared deviations with `1 - exp(-x)`:
//! zero at zero deviation, strictly increasing, diminishing at the top.
//! Very large outliers saturate near 1 and become hard to tell apart.

use std::collections::BTreeMap;

use crate::types::{BaselineConfig, LayerOutput, MissingLayerPolicy};
use crate::SIGMA_FLOOR;

/// Per-layer deviation and per-layer confidence, keyed by layer id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviationVector {
    pub deviation: BTreeMap<String, f64>,
    pub confidence: BTreeMap<String, f64>,
}

/// Final numbers for one (turn, scope)
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub vector: DeviationVector,
    pub severity: f64,
    pub confidence: f64,
    /// Set when the fail-closed policy overrode the aggregate
    pub failed_closed: bool,
}

/// `|score - mu| / max(sigma, ε)` for every layer present in both the
/// outputs and the config; layers the config does not know are dropped
pub fn deviation(config: &BaselineConfig, layers: &[LayerOutput]) -> DeviationVector {
    let mut vector = DeviationVector::default();
    for layer in layers {
        let Some(spec) = config.baselines.get(&layer.layer_id) else {
            continue;
        };
        let sigma = spec.sigma.max(SIGMA_FLOOR);
        let d = (layer.score - spec.mu).abs() / sigma;
        vector.deviation.insert(layer.layer_id.clone(), d);
        vector.confidence.insert(layer.layer_id.clone(), layer.confidence);
    }
    vector
}

/// Weights over the layers present in `values`, summing to 1.
/// Layers absent from the weight map are excluded, never zero-filled.
fn renormalized<'a>(
    config: &BaselineConfig,
    values: &'a BTreeMap<String, f64>,
) -> Vec<(f64, &'a f64)> {
    let present: Vec<(f64, &f64)> = values
        .iter()
        .filter_map(|(layer, v)| config.layer_weights.get(layer).map(|w| (*w, v)))
        .collect();

    let total: f64 = present.iter().map(|(w, _)| w).sum();
    let total = if total > 0.0 { total } else { 1.0 };

    present.into_iter().map(|(w, v)| (w / total, v)).collect()
}

/// `1 - exp(-Σ w_i·d_i²)` over renormalized weights; 0 when nothing overlaps
pub fn aggregate_severity(config: &BaselineConfig, deviation: &BTreeMap<String, f64>) -> f64 {
    let weighted = renormalized(config, deviation);
    if weighted.is_empty() {
        return 0.0;
    }
    let acc: f64 = weighted.iter().map(|(w, d)| w * *d * *d).sum();
    1.0 - (-acc).exp()
}

/// Weighted mean of per-layer confidences; 0 when nothing overlaps
pub fn aggregate_confidence(config: &BaselineConfig, confidence: &BTreeMap<String, f64>) -> f64 {
    renormalized(config, confidence)
        .iter()
        .map(|(w, c)| w * *c)
        .sum()
}

/// Run the full aggregation for one scope, applying the missing-layer policy.
///
/// Fail closed: if any layer named in `baselines` produced no output (or
/// nothing overlaps), severity is forced to 1.0 and confidence to 0.0.
pub fn assess(config: &BaselineConfig, layers: &[LayerOutput]) -> Assessment {
    let vector = deviation(config, layers);

    let missing = vector.deviation.is_empty()
        || config
            .baselines
            .keys()
            .any(|layer| !vector.deviation.contains_key(layer));

    if config.missing_layer_policy == MissingLayerPolicy::FailClosed && missing {
        return Assessment {
            vector,
            severity: 1.0,
            confidence: 0.0,
            failed_closed: true,
        };
    }

    let severity = aggregate_severity(config, &vector.deviation);
    let confidence = aggregate_confidence(config, &vector.confidence);
    Assessment {
        vector,
        severity,
        confidence,
        failed_closed: false,
    }
}

// =============================================================================
// TESTS
// =============================================================================
