//! CDE: conversational deviation engine
//!
//! One turn in → per-layer extraction → deviation from baseline →
//! per-scope EMA + hysteresis → routing decision → provenanced event.

pub mod core;
pub mod error;
pub mod types;

pub use error::{CdeError, Result};

// =============================================================================
// ROUTING DEFAULTS - used when a baseline document omits a threshold
// =============================================================================

/// Severity at which an active scope is quarantined
pub const DEFAULT_QUARANTINE_AT: f64 = 0.85;

/// Severity at which an active scope gets a hard gate (freeze updates)
pub const DEFAULT_FREEZE_AT: f64 = 0.75;

/// Severity at which an active scope is sent to review
pub const DEFAULT_REVIEW_AT: f64 = 0.60;

/// Below this aggregate confidence an active scope only gets soft review
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.35;

// =============================================================================
// NUMERICS
// =============================================================================

/// Floor applied to every baseline sigma before dividing
pub const SIGMA_FLOOR: f64 = 1e-6;

/// Number of layers reported as dominant on each event
pub const DOMINANT_LAYERS_TOP_N: usize = 2;

// =============================================================================
// STORAGE
// =============================================================================

/// Fallback baseline document, always consulted last
pub const GLOBAL_MANIFEST: &str = "global.json";

/// Session used by the HTTP boundary when a request names none
pub const DEFAULT_SESSION_ID: &str = "default";

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "0.1.0";
