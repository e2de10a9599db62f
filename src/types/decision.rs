//! Routing decisions and gate levels

use serde::{Deserialize, Serialize};

/// How hard downstream consumers should gate the scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum GateLevel {
    /// No gating
    Normal = 0,
    /// Soft review / dampen
    Dampen = 1,
    /// Hard gate: freeze updates
    Freeze = 2,
}

impl GateLevel {
    pub fn level(&self) -> u8 {
        *self as u8
    }
}

impl From<GateLevel> for u8 {
    fn from(level: GateLevel) -> Self {
        level as u8
    }
}

impl TryFrom<u8> for GateLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GateLevel::Normal),
            1 => Ok(GateLevel::Dampen),
            2 => Ok(GateLevel::Freeze),
            other => Err(format!("gate level {} out of range 0..=2", other)),
        }
    }
}

impl std::fmt::Display for GateLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GateLevel::Normal => "NORMAL",
            GateLevel::Dampen => "DAMPEN",
            GateLevel::Freeze => "FREEZE",
        };
        write!(f, "{}", name)
    }
}

/// Why a decision was softened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionNote {
    /// Aggregate confidence below the action threshold
    LowConfidence,
}

/// Structured gating outcome for one (turn, scope)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub quarantine: bool,
    #[serde(rename = "review_band")]
    pub review: bool,
    #[serde(rename = "policy_gate_level")]
    pub gate_level: GateLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<DecisionNote>,
}

impl RoutingDecision {
    /// Decision for an inactive scope
    pub fn pass() -> Self {
        Self::new(false, false, GateLevel::Normal)
    }

    pub fn new(quarantine: bool, review: bool, gate_level: GateLevel) -> Self {
        Self {
            quarantine,
            review,
            gate_level,
            note: None,
        }
    }

    pub fn with_note(mut self, note: DecisionNote) -> Self {
        self.note = Some(note);
        self
    }
}

impl Default for RoutingDecision {
    fn default() -> Self {
        Self::pass()
    }
}
