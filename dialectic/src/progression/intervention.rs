//! Turn inputs, intervention records, and per-turn snapshots.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::concepts::TensionPair;
use crate::entailment::EntailmentKind;

/// Free-form context supplied with each turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnContext {
    /// Running summary of the discussion so far.
    #[serde(default)]
    pub episode_summary: String,
    /// Anything else the orchestrator wants to carry along.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TurnContext {
    pub fn with_summary(summary: impl Into<String>) -> Self {
        Self {
            episode_summary: summary.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// What an intervention asks the discussion to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionKind {
    /// Demand a concrete, falsifiable implication.
    ConsequenceTest,
    /// Move away from an exhausted tension.
    Pivot,
    /// Periodic safety-valve synthesis.
    Synthesis,
}

impl std::fmt::Display for InterventionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConsequenceTest => write!(f, "consequence_test"),
            Self::Pivot => write!(f, "pivot"),
            Self::Synthesis => write!(f, "synthesis"),
        }
    }
}

/// A prompt the orchestrator should have some participant speak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intervention {
    #[serde(rename = "type")]
    pub kind: InterventionKind,
    pub prompt: String,
    pub tension: TensionPair,
    pub turn: u64,
    /// Speaker of the turn that triggered this intervention.
    #[serde(default)]
    pub triggered_by: String,
    /// Cycle count of the tension when the intervention was emitted.
    #[serde(default)]
    pub cycles: u32,
}

/// Running counters over a discussion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionMetrics {
    pub orbit_count: u64,
    pub tests_injected: u64,
    pub pivots_forced: u64,
    pub entailments_detected: u64,
    pub turns_processed: u64,
    pub syntheses_emitted: u64,
}

/// Derived state after one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnSnapshot {
    pub turn: u64,
    pub active_tensions: Vec<TensionPair>,
    pub entailments: BTreeSet<EntailmentKind>,
    pub strongest_entailment: Option<EntailmentKind>,
    pub saturated_tensions: usize,
    pub metrics: ProgressionMetrics,
}

/// Everything `process_turn` returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    /// False when progression is disabled and the turn was ignored.
    pub processed: bool,
    pub interventions: Vec<Intervention>,
    pub snapshot: TurnSnapshot,
}

impl TurnOutcome {
    pub fn has_interventions(&self) -> bool {
        !self.interventions.is_empty()
    }

    pub fn of_kind(&self, kind: InterventionKind) -> impl Iterator<Item = &Intervention> {
        self.interventions.iter().filter(move |i| i.kind == kind)
    }
}
