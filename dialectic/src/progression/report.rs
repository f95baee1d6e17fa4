//! Status report for observability and debugging.

use serde::Serialize;
use std::collections::BTreeMap;

use super::intervention::{Intervention, ProgressionMetrics};
use crate::config::ProgressionConfig;
use crate::tension::{TensionPhase, TensionState};

/// Derived view of one tension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TensionReport {
    pub cycles: u32,
    pub max_cycles: u32,
    pub consequence_tests: usize,
    pub pending_tests: usize,
    pub failed_tests: usize,
    pub last_entailment_turn: Option<u64>,
    pub needs_pivot: bool,
    pub is_saturated: bool,
    pub should_inject_test: bool,
    pub should_pivot: bool,
    pub phase: TensionPhase,
}

impl From<&TensionState> for TensionReport {
    fn from(state: &TensionState) -> Self {
        Self {
            cycles: state.cycles,
            max_cycles: state.max_cycles(),
            consequence_tests: state.consequence_tests.len(),
            pending_tests: state
                .consequence_tests
                .iter()
                .filter(|t| t.is_pending())
                .count(),
            failed_tests: state.failed_test_count(),
            last_entailment_turn: state.last_new_entailment_turn,
            needs_pivot: state.needs_pivot,
            is_saturated: state.is_saturated(),
            should_inject_test: state.should_inject_test(),
            should_pivot: state.should_pivot(),
            phase: state.phase(),
        }
    }
}

/// Controller-wide state summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSummary {
    pub turn_index: u64,
    pub last_pivot_turn: Option<u64>,
    pub current_tension: Option<String>,
    pub tracked_tensions: usize,
    pub pending_tests: usize,
    pub enhancer_enabled: bool,
}

/// Full status report: configuration, state, per-tension detail, metrics.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressionReport {
    pub config: ProgressionConfig,
    pub state: StateSummary,
    /// Keyed by "a/b".
    pub tensions: BTreeMap<String, TensionReport>,
    pub metrics: ProgressionMetrics,
    pub recent_interventions: Vec<Intervention>,
}

impl ProgressionReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// One line per tension, for terminal output.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "turn {} | tensions {} | pending tests {} | tests {} | pivots {} | syntheses {} | orbits {}",
            self.state.turn_index,
            self.state.tracked_tensions,
            self.state.pending_tests,
            self.metrics.tests_injected,
            self.metrics.pivots_forced,
            self.metrics.syntheses_emitted,
            self.metrics.orbit_count,
        )];
        for (key, t) in &self.tensions {
            lines.push(format!(
                "  {:<28} {:<13} cycles {}/{} tests {} (failed {})",
                key,
                t.phase.to_string(),
                t.cycles,
                t.max_cycles,
                t.consequence_tests,
                t.failed_tests
            ));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tension_report_from_state() {
        let mut state = TensionState::new(2, 2);
        state.increment_cycle();
        state.increment_cycle();
        state.add_consequence_test(3, "p");

        let report = TensionReport::from(&state);
        assert_eq!(report.cycles, 2);
        assert_eq!(report.max_cycles, 2);
        assert_eq!(report.consequence_tests, 1);
        assert_eq!(report.pending_tests, 1);
        assert!(report.is_saturated);
        assert!(report.should_inject_test);
        assert!(!report.should_pivot);
        assert_eq!(report.phase, TensionPhase::Saturated);
    }

    #[test]
    fn test_summary_lines() {
        let mut tensions = BTreeMap::new();
        tensions.insert(
            "contingency/necessity".to_string(),
            TensionReport::from(&TensionState::new(2, 2)),
        );
        let report = ProgressionReport {
            config: ProgressionConfig::default(),
            state: StateSummary {
                turn_index: 4,
                last_pivot_turn: None,
                current_tension: None,
                tracked_tensions: 1,
                pending_tests: 0,
                enhancer_enabled: false,
            },
            tensions,
            metrics: ProgressionMetrics::default(),
            recent_interventions: Vec::new(),
        };
        let lines = report.summary_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("turn 4"));
        assert!(lines[1].contains("contingency/necessity"));
        assert!(lines[1].contains("active_fresh"));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["tensions"]["contingency/necessity"]["max_cycles"], 2);
        assert_eq!(json["config"]["cycles_threshold"], 2);
    }
}
