//! Per-scope hysteresis state

use serde::{Deserialize, Serialize};

/// Smoothed severity and activation flag for one scope
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScopeState {
    /// Exponentially smoothed severity; not clamped
    pub ema: f64,
    /// True once the scope entered and has not exited yet
    pub active: bool,
    /// Number of steps this scope has seen
    pub observations: u64,
}

/// What a single step did to the activation flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    #[default]
    None,
    Enter,
    Exit,
}

impl Transition {
    pub fn is_enter(&self) -> bool {
        matches!(self, Transition::Enter)
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, Transition::Exit)
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Transition::None => "NONE",
            Transition::Enter => "ENTER",
            Transition::Exit => "EXIT",
        };
        write!(f, "{}", name)
    }
}
