//! Baseline configuration documents

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{DEFAULT_FREEZE_AT, DEFAULT_MIN_CONFIDENCE, DEFAULT_QUARANTINE_AT, DEFAULT_REVIEW_AT};

/// Expected behavior of one layer: mean and scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineSpec {
    #[serde(default)]
    pub mu: f64,
    #[serde(default = "default_sigma")]
    pub sigma: f64,
}

fn default_sigma() -> f64 {
    1.0
}

/// What to do when a configured layer produced no output this turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingLayerPolicy {
    /// Exclude the layer and renormalize weights over the rest
    #[default]
    DropAndRenormalize,
    /// Treat the turn as maximally deviant with zero confidence
    FailClosed,
}

/// Routing overrides as written in a baseline document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarantine_at: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_at: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freeze_updates_at: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence_for_action: Option<f64>,
}

/// Effective routing thresholds, every default applied
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutingThresholds {
    pub quarantine_at: f64,
    pub freeze_at: f64,
    pub review_at: f64,
    pub min_confidence_for_action: f64,
}

impl Default for RoutingThresholds {
    fn default() -> Self {
        Self {
            quarantine_at: DEFAULT_QUARANTINE_AT,
            freeze_at: DEFAULT_FREEZE_AT,
            review_at: DEFAULT_REVIEW_AT,
            min_confidence_for_action: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

/// EMA + hysteresis knobs for one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HysteresisParams {
    pub beta: f64,
    pub theta_enter: f64,
    pub theta_exit: f64,
}

/// A versioned baseline document, loaded per scope class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineConfig {
    pub manifest_version: String,
    pub baseline_family_id: String,
    pub parameter_version: String,

    /// EMA smoothing factor in [0, 1]; weight kept on the previous value
    pub ema_beta: f64,
    /// Activation threshold on the smoothed severity
    pub theta_enter: f64,
    /// theta_exit = alpha_exit * theta_enter, alpha_exit in (0, 1]
    pub alpha_exit: f64,

    /// Per-layer weights, renormalized over the layers present each turn
    pub layer_weights: BTreeMap<String, f64>,

    #[serde(default)]
    pub missing_layer_policy: MissingLayerPolicy,

    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    pub baselines: BTreeMap<String, BaselineSpec>,

    #[serde(default)]
    pub routing: RoutingConfig,
}

fn default_min_confidence() -> f64 {
    DEFAULT_MIN_CONFIDENCE
}

impl BaselineConfig {
    /// Exit threshold, never above the enter threshold for a valid document
    pub fn theta_exit(&self) -> f64 {
        self.alpha_exit * self.theta_enter
    }

    pub fn hysteresis(&self) -> HysteresisParams {
        HysteresisParams {
            beta: self.ema_beta,
            theta_enter: self.theta_enter,
            theta_exit: self.theta_exit(),
        }
    }

    /// Routing overrides merged over the defaults; the document-level
    /// `min_confidence` stands in when routing does not set its own
    pub fn routing_thresholds(&self) -> RoutingThresholds {
        let defaults = RoutingThresholds::default();
        RoutingThresholds {
            quarantine_at: self.routing.quarantine_at.unwrap_or(defaults.quarantine_at),
            freeze_at: self.routing.freeze_updates_at.unwrap_or(defaults.freeze_at),
            review_at: self.routing.review_at.unwrap_or(defaults.review_at),
            min_confidence_for_action: self
                .routing
                .min_confidence_for_action
                .unwrap_or(self.min_confidence),
        }
    }

    /// Shape checks beyond what serde enforces. Returns the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.ema_beta) {
            return Err(format!("ema_beta must be in [0, 1], got {}", self.ema_beta));
        }
        if !self.theta_enter.is_finite() || self.theta_enter < 0.0 {
            return Err(format!("theta_enter must be finite and >= 0, got {}", self.theta_enter));
        }
        if !(self.alpha_exit > 0.0 && self.alpha_exit <= 1.0) {
            return Err(format!("alpha_exit must be in (0, 1], got {}", self.alpha_exit));
        }
        if !self.min_confidence.is_finite() {
            return Err("min_confidence must be finite".to_string());
        }
        for (layer, w) in &self.layer_weights {
            if !w.is_finite() || *w < 0.0 {
                return Err(format!("weight for layer '{}' must be finite and >= 0", layer));
            }
        }
        for (layer, spec) in &self.baselines {
            if !spec.mu.is_finite() || !spec.sigma.is_finite() {
                return Err(format!("baseline for layer '{}' must be finite", layer));
            }
            if spec.sigma <= 0.0 {
                return Err(format!("sigma for layer '{}' must be > 0, got {}", layer, spec.sigma));
            }
        }
        let routing = [
            self.routing.quarantine_at,
            self.routing.review_at,
            self.routing.freeze_updates_at,
            self.routing.min_confidence_for_action,
        ];
        if routing.iter().flatten().any(|v| !v.is_finite()) {
            return Err("routing thresholds must be finite".to_string());
        }
        Ok(())
    }
}
