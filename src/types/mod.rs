//! Core types for CDE

mod scope;
mod turn;
mod baseline;
mod evidence;
mod state;
mod decision;
mod event;
mod report;

pub use scope::ScopeKey;
pub use turn::{Turn, now_epoch_secs};
pub use baseline::{
    BaselineConfig, BaselineSpec, MissingLayerPolicy, RoutingConfig, RoutingThresholds,
    HysteresisParams,
};
pub use evidence::{EvidenceSpan, LayerOutput};
pub use state::{ScopeState, Transition};
pub use decision::{GateLevel, DecisionNote, RoutingDecision};
pub use event::{DeviationEvent, ScopeFailure, TurnOutcome};
pub use report::{TurnReport, LastSnapshot, ScopeSummary};
