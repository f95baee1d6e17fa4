//! Per-tension state machine: cycles, consequence tests and pivot flags.
//!
//! ```text
//! ActiveFresh ──increment_cycle (cycles ≥ max)──▶ Saturated
//!      ▲                                            │
//!      └──────────── record_entailment ◀────────────┤
//!      ▲                                            ▼
//!      └──────────── record_entailment ◀──── PivotNeeded
//!                                     (tests failed / marked)
//! ```
//!
//! Invalid transitions are no-ops; the state never errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A consequence test issued for one tension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsequenceTest {
    /// Turn at which the test was issued.
    pub turn: u64,
    pub prompt: String,
    /// Set once a reply was observed or the test timed out.
    #[serde(default)]
    pub responded: bool,
    /// Whether the resolving reply carried new substantive content.
    #[serde(default)]
    pub had_entailment: bool,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ConsequenceTest {
    pub fn new(turn: u64, prompt: impl Into<String>) -> Self {
        Self {
            turn,
            prompt: prompt.into(),
            responded: false,
            had_entailment: false,
            timestamp: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.responded
    }

    /// A test that was answered (or timed out) without new content.
    pub fn is_failed(&self) -> bool {
        self.responded && !self.had_entailment
    }
}

/// Coarse phase of a tension, derived from its counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensionPhase {
    ActiveFresh,
    Saturated,
    PivotNeeded,
}

impl std::fmt::Display for TensionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ActiveFresh => write!(f, "active_fresh"),
            Self::Saturated => write!(f, "saturated"),
            Self::PivotNeeded => write!(f, "pivot_needed"),
        }
    }
}

/// Progress record for a single tension pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TensionState {
    /// Consecutive turns touching this tension without new content.
    pub cycles: u32,
    pub last_new_entailment_turn: Option<u64>,
    pub consequence_tests: Vec<ConsequenceTest>,
    pub last_consequence_turn: Option<u64>,
    pub needs_pivot: bool,
    /// Turn at which a pivot was emitted for the current episode.
    pub pivot_issued_turn: Option<u64>,
    #[serde(skip)]
    max_cycles: u32,
    #[serde(skip)]
    max_consequence_tests: u32,
}

impl Default for TensionState {
    fn default() -> Self {
        Self::new(2, 2)
    }
}

impl TensionState {
    pub fn new(max_cycles: u32, max_consequence_tests: u32) -> Self {
        Self {
            cycles: 0,
            last_new_entailment_turn: None,
            consequence_tests: Vec::new(),
            last_consequence_turn: None,
            needs_pivot: false,
            pivot_issued_turn: None,
            max_cycles,
            max_consequence_tests,
        }
    }

    /// Re-apply thresholds after deserialization.
    pub fn set_limits(&mut self, max_cycles: u32, max_consequence_tests: u32) {
        self.max_cycles = max_cycles;
        self.max_consequence_tests = max_consequence_tests;
    }

    pub fn max_cycles(&self) -> u32 {
        self.max_cycles
    }

    pub fn increment_cycle(&mut self) {
        self.cycles = self.cycles.saturating_add(1);
    }

    /// New substantive content: back to fresh, whatever the prior state.
    pub fn record_entailment(&mut self, turn: u64) {
        self.cycles = 0;
        self.last_new_entailment_turn = Some(turn);
        self.needs_pivot = false;
        self.pivot_issued_turn = None;
    }

    /// Append a test record. No-op unless a test is currently warranted.
    ///
    /// Returns the index of the new record.
    pub fn add_consequence_test(&mut self, turn: u64, prompt: impl Into<String>) -> Option<usize> {
        if !self.should_inject_test() {
            return None;
        }
        self.consequence_tests.push(ConsequenceTest::new(turn, prompt));
        self.last_consequence_turn = Some(turn);
        Some(self.consequence_tests.len() - 1)
    }

    /// Resolve a pending test exactly once. Returns false if already resolved
    /// or out of range.
    pub fn resolve_test(&mut self, index: usize, had_entailment: bool) -> bool {
        match self.consequence_tests.get_mut(index) {
            Some(test) if test.is_pending() => {
                test.responded = true;
                test.had_entailment = had_entailment;
                true
            }
            _ => false,
        }
    }

    pub fn mark_pivot_needed(&mut self) {
        self.needs_pivot = true;
    }

    /// Latch that a pivot intervention was emitted at `turn`.
    pub fn record_pivot(&mut self, turn: u64) {
        self.needs_pivot = true;
        self.pivot_issued_turn = Some(turn);
    }

    pub fn is_saturated(&self) -> bool {
        self.cycles >= self.max_cycles
    }

    /// Tests issued since the last turn that produced new content.
    pub fn episode_tests(&self) -> impl Iterator<Item = &ConsequenceTest> {
        let since = self.last_new_entailment_turn;
        self.consequence_tests
            .iter()
            .filter(move |t| since.map_or(true, |s| t.turn > s))
    }

    pub fn failed_test_count(&self) -> usize {
        self.episode_tests().filter(|t| t.is_failed()).count()
    }

    pub fn should_inject_test(&self) -> bool {
        self.is_saturated()
            && (self.episode_tests().count() as u32) < self.max_consequence_tests
            && !self.needs_pivot
    }

    pub fn should_pivot(&self) -> bool {
        self.needs_pivot || self.failed_test_count() as u32 >= self.max_consequence_tests
    }

    /// Whether the controller may emit a pivot now (once per episode).
    pub fn can_emit_pivot(&self) -> bool {
        self.should_pivot() && self.pivot_issued_turn.is_none()
    }

    pub fn phase(&self) -> TensionPhase {
        if self.should_pivot() {
            TensionPhase::PivotNeeded
        } else if self.is_saturated() {
            TensionPhase::Saturated
        } else {
            TensionPhase::ActiveFresh
        }
    }

    /// Prompts already used for this tension, oldest first.
    pub fn used_prompts(&self) -> Vec<String> {
        self.consequence_tests.iter().map(|t| t.prompt.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saturated() -> TensionState {
        let mut s = TensionState::new(2, 2);
        s.increment_cycle();
        s.increment_cycle();
        s
    }

    #[test]
    fn test_saturation_on_threshold() {
        let mut s = TensionState::new(2, 2);
        s.increment_cycle();
        assert!(!s.is_saturated());
        assert!(!s.should_inject_test());
        assert_eq!(s.phase(), TensionPhase::ActiveFresh);
        s.increment_cycle();
        assert!(s.is_saturated());
        assert!(s.should_inject_test());
        assert_eq!(s.phase(), TensionPhase::Saturated);
    }

    #[test]
    fn test_cycles_are_not_clamped() {
        let mut s = TensionState::new(2, 2);
        for _ in 0..7 {
            s.increment_cycle();
        }
        assert_eq!(s.cycles, 7);
    }

    #[test]
    fn test_record_entailment_resets_from_any_state() {
        let mut s = saturated();
        s.mark_pivot_needed();
        s.record_pivot(4);
        s.record_entailment(5);
        assert_eq!(s.cycles, 0);
        assert!(!s.needs_pivot);
        assert_eq!(s.pivot_issued_turn, None);
        assert_eq!(s.last_new_entailment_turn, Some(5));
        assert_eq!(s.phase(), TensionPhase::ActiveFresh);
    }

    #[test]
    fn test_add_test_is_noop_when_not_warranted() {
        let mut s = TensionState::new(2, 2);
        assert_eq!(s.add_consequence_test(1, "too early"), None);
        assert!(s.consequence_tests.is_empty());
        assert_eq!(s.last_consequence_turn, None);
    }

    #[test]
    fn test_test_budget_exhausts() {
        let mut s = saturated();
        assert_eq!(s.add_consequence_test(2, "first"), Some(0));
        assert_eq!(s.add_consequence_test(3, "second"), Some(1));
        assert!(!s.should_inject_test());
        assert_eq!(s.add_consequence_test(4, "third"), None);
        assert_eq!(s.last_consequence_turn, Some(3));
    }

    #[test]
    fn test_pivot_after_failed_tests() {
        let mut s = saturated();
        s.add_consequence_test(2, "first");
        s.add_consequence_test(3, "second");
        assert!(!s.should_pivot());
        assert!(s.resolve_test(0, false));
        assert!(!s.should_pivot());
        assert!(s.resolve_test(1, false));
        assert!(s.should_pivot());
        assert!(s.can_emit_pivot());
        assert_eq!(s.phase(), TensionPhase::PivotNeeded);
    }

    #[test]
    fn test_successful_test_does_not_count_towards_pivot() {
        let mut s = saturated();
        s.add_consequence_test(2, "first");
        s.add_consequence_test(3, "second");
        s.resolve_test(0, true);
        s.resolve_test(1, false);
        assert!(!s.should_pivot());
    }

    #[test]
    fn test_resolve_only_once() {
        let mut s = saturated();
        s.add_consequence_test(2, "first");
        assert!(s.resolve_test(0, false));
        assert!(!s.resolve_test(0, true));
        assert!(!s.consequence_tests[0].had_entailment);
        assert!(!s.resolve_test(9, true));
    }

    #[test]
    fn test_pivot_latch() {
        let mut s = saturated();
        s.mark_pivot_needed();
        assert!(s.can_emit_pivot());
        assert!(!s.should_inject_test());
        s.record_pivot(6);
        assert!(s.should_pivot());
        assert!(!s.can_emit_pivot());
    }

    #[test]
    fn test_entailment_starts_new_episode() {
        let mut s = saturated();
        s.add_consequence_test(2, "first");
        s.add_consequence_test(3, "second");
        s.resolve_test(0, false);
        s.resolve_test(1, false);
        assert!(s.should_pivot());

        s.record_entailment(5);
        assert!(!s.should_pivot());
        assert_eq!(s.episode_tests().count(), 0);
        s.increment_cycle();
        s.increment_cycle();
        assert!(s.should_inject_test());
        assert_eq!(s.used_prompts().len(), 2);
    }

    #[test]
    fn test_serde_roundtrip_preserves_counters() {
        let mut s = saturated();
        s.add_consequence_test(2, "first");
        s.resolve_test(0, false);
        let json = serde_json::to_string(&s).unwrap();
        let mut restored: TensionState = serde_json::from_str(&json).unwrap();
        restored.set_limits(2, 2);
        assert_eq!(restored.cycles, 2);
        assert_eq!(restored.consequence_tests, s.consequence_tests);
        assert!(restored.should_inject_test());
    }

    #[test]
    fn test_missing_fields_default() {
        let restored: TensionState = serde_json::from_str(r#"{"cycles": 3}"#).unwrap();
        assert_eq!(restored.cycles, 3);
        assert!(restored.consequence_tests.is_empty());
        assert!(!restored.needs_pivot);

        let test: ConsequenceTest = serde_json::from_str(r#"{"turn": 4, "prompt": "p"}"#).unwrap();
        assert!(test.is_pending());
    }
}
