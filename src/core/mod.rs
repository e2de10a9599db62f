//! Core modules for CDE

pub mod extractor;
pub mod lexical;
pub mod pragmatic;
pub mod baseline;
pub mod deviation;
pub mod hysteresis;
pub mod routing;
pub mod rationale;
pub mod engine;
pub mod arbitrate;
pub mod audit;
pub mod replay;
pub mod api;

pub use extractor::Extractor;
pub use lexical::{LexicalExtractor, LEXICAL_CONFIDENCE_FLOOR};
pub use pragmatic::{PragmaticExtractor, PRAGMATIC_CONFIDENCE_FLOOR};
pub use baseline::{BaselineResolver, ResolvedBaseline, fingerprint};
pub use deviation::{deviation, aggregate_severity, aggregate_confidence, assess, Assessment, DeviationVector};
pub use hysteresis::{HysteresisTable, StepOutcome};
pub use routing::route;
pub use rationale::{collect_evidence, dominant_layers};
pub use engine::DeviationEngine;
pub use arbitrate::select_top_event;
pub use audit::AuditLog;
pub use replay::{load_turns, parse_turns, run_file, run_turns, summarize, ReplayRun};
pub use api::{create_router, run_server};
