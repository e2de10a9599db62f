//! Rationale: merged evidence and dominant layers

use std::collections::BTreeMap;

use crate::types::{EvidenceSpan, LayerOutput};

/// All spans, emission order within a layer, then layer order
pub fn collect_evidence(layers: &[LayerOutput]) -> Vec<EvidenceSpan> {
    layers.iter().flat_map(|l| l.evidence.iter().cloned()).collect()
}

/// Top `top_n` layer ids by deviation, descending. The sort is stable, so
/// ties keep the map's iteration order (layer id ascending).
pub fn dominant_layers(deviation: &BTreeMap<String, f64>, top_n: usize) -> Vec<String> {
    let mut ranked: Vec<(&String, f64)> = deviation.iter().map(|(k, v)| (k, *v)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.into_iter().take(top_n).map(|(k, _)| k.clone()).collect()
}
