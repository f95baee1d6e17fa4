//! Progression controller: turns in, interventions out.
//!
//! Holds every tension's state for a discussion, runs the per-turn pipeline,
//! and owns checkpointing and status reporting.

pub mod controller;
pub mod intervention;
pub mod persistence;
pub mod report;

pub use controller::ProgressionController;
pub use intervention::{
    Intervention, InterventionKind, ProgressionMetrics, TurnContext, TurnOutcome, TurnSnapshot,
};
pub use persistence::{validate_checkpoint, IntegrityStatus, ProgressionCheckpoint};
pub use report::{ProgressionReport, StateSummary, TensionReport};
