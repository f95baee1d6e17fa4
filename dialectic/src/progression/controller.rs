//! Per-turn progression pipeline.
//!
//! Each call to [`ProgressionController::process_turn`] runs, in order:
//!
//! 1. topic extraction and tension detection over a short topic window
//! 2. entailment detection on the turn
//! 3. per-tension cycle accounting, emitting consequence tests or pivots
//! 4. orbit counting
//! 5. resolution of earlier pending tests against this turn
//! 6. the periodic synthesis check
//!
//! The controller never fails a turn. Generation problems are logged and the
//! intervention is skipped.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

use tracing::{debug, info, info_span, warn, Instrument};

use super::intervention::{
    Intervention, InterventionKind, ProgressionMetrics, TurnContext, TurnOutcome, TurnSnapshot,
};
use super::persistence::{IntegrityStatus, ProgressionCheckpoint};
use super::report::{ProgressionReport, StateSummary, TensionReport};
use crate::concepts::{ConceptExtractor, TensionPair};
use crate::config::ProgressionConfig;
use crate::consequence::{ConsequenceGenerator, Enhancer, TemplateBank, TestContext};
use crate::entailment::EntailmentDetector;
use crate::error::ProgressionResult;
use crate::tension::{ConsequenceTest, TensionState};

/// Interventions kept for the status report.
const RECENT_INTERVENTIONS: usize = 32;

/// A consequence test awaiting a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingTest {
    tension: TensionPair,
    index: usize,
}

/// Tracks every tension across a discussion and decides interventions.
#[derive(Debug)]
pub struct ProgressionController {
    config: ProgressionConfig,
    extractor: ConceptExtractor,
    detector: EntailmentDetector,
    generator: ConsequenceGenerator,
    tensions: BTreeMap<TensionPair, TensionState>,
    turn_index: u64,
    last_pivot_turn: Option<u64>,
    current_tension: Option<TensionPair>,
    recent_topics: VecDeque<BTreeSet<String>>,
    pending_tests: Vec<PendingTest>,
    metrics: ProgressionMetrics,
    recent_interventions: VecDeque<Intervention>,
}

impl ProgressionController {
    /// Controller over the built-in lexicon and template bank.
    pub fn new(config: ProgressionConfig) -> ProgressionResult<Self> {
        let extractor = ConceptExtractor::with_default_lexicon();
        let generator =
            ConsequenceGenerator::new(TemplateBank::default(), extractor.tensions().to_vec());
        Self::with_components(config, extractor, EntailmentDetector::default(), generator)
    }

    /// Controller over caller-supplied components.
    pub fn with_components(
        config: ProgressionConfig,
        extractor: ConceptExtractor,
        detector: EntailmentDetector,
        generator: ConsequenceGenerator,
    ) -> ProgressionResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            extractor,
            detector,
            generator,
            tensions: BTreeMap::new(),
            turn_index: 0,
            last_pivot_turn: None,
            current_tension: None,
            recent_topics: VecDeque::new(),
            pending_tests: Vec::new(),
            metrics: ProgressionMetrics::default(),
            recent_interventions: VecDeque::new(),
        })
    }

    /// Attach a prompt enhancer to the consequence generator.
    pub fn with_enhancer(mut self, enhancer: Box<dyn Enhancer>) -> Self {
        self.generator = self.generator.with_enhancer(enhancer);
        self
    }

    pub fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ProgressionMetrics {
        &self.metrics
    }

    pub fn turn_index(&self) -> u64 {
        self.turn_index
    }

    pub fn last_pivot_turn(&self) -> Option<u64> {
        self.last_pivot_turn
    }

    pub fn current_tension(&self) -> Option<&TensionPair> {
        self.current_tension.as_ref()
    }

    pub fn tension_state(&self, tension: &TensionPair) -> Option<&TensionState> {
        self.tensions.get(tension)
    }

    pub fn tensions(&self) -> &BTreeMap<TensionPair, TensionState> {
        &self.tensions
    }

    pub fn pending_test_count(&self) -> usize {
        self.pending_tests.len()
    }

    /// Most recent interventions, oldest first.
    pub fn recent_interventions(&self) -> impl Iterator<Item = &Intervention> {
        self.recent_interventions.iter()
    }

    /// Process one discussion turn and return any interventions it triggers.
    ///
    /// When progression is disabled the turn is ignored and no state changes.
    pub async fn process_turn(
        &mut self,
        content: &str,
        speaker: &str,
        context: &TurnContext,
    ) -> TurnOutcome {
        if !self.config.enable_progression {
            return TurnOutcome {
                processed: false,
                interventions: Vec::new(),
                snapshot: TurnSnapshot {
                    turn: self.turn_index,
                    active_tensions: Vec::new(),
                    entailments: BTreeSet::new(),
                    strongest_entailment: None,
                    saturated_tensions: self.saturated_count(),
                    metrics: self.metrics.clone(),
                },
            };
        }

        let span = info_span!("progression.turn", turn = self.turn_index + 1, speaker);
        self.run_turn(content, speaker, context)
            .instrument(span)
            .await
    }

    async fn run_turn(&mut self, content: &str, speaker: &str, context: &TurnContext) -> TurnOutcome {
        self.turn_index += 1;
        self.metrics.turns_processed += 1;
        let turn = self.turn_index;
        let summary = context.episode_summary.as_str();

        // Tensions over this turn plus the recent topic window.
        let prior: Vec<BTreeSet<String>> = self.recent_topics.iter().cloned().collect();
        let active = self
            .extractor
            .detect_tensions(content, &prior, self.config.topic_window);
        self.recent_topics
            .push_back(self.extractor.extract_topics(content));
        while self.recent_topics.len() > self.config.topic_window.max(1) {
            self.recent_topics.pop_front();
        }

        let entailments = self.detector.detect(content);
        let strongest = self.detector.get_strongest_entailment(content);
        let has_entailment = !entailments.is_empty();
        if has_entailment {
            self.metrics.entailments_detected += 1;
        }
        debug!(
            active = active.len(),
            entailments = entailments.len(),
            "turn analysed"
        );

        let mut interventions = Vec::new();

        for tension in &active {
            let (max_cycles, max_tests) = self.limits();
            let state = self
                .tensions
                .entry(tension.clone())
                .or_insert_with(|| TensionState::new(max_cycles, max_tests));

            if has_entailment {
                state.record_entailment(turn);
                debug!(tension = %tension, "entailment resets tension");
                continue;
            }

            state.increment_cycle();

            if state.should_inject_test() {
                let previous = state.used_prompts();
                let ctx = TestContext {
                    tension,
                    claim: content,
                    discussion_summary: summary,
                    turn_count: turn,
                    previous_tests: &previous,
                };
                match self.generator.generate_test(&ctx).await {
                    Ok(prompt) => {
                        if let Some(index) = state.add_consequence_test(turn, prompt.clone()) {
                            self.pending_tests.push(PendingTest {
                                tension: tension.clone(),
                                index,
                            });
                            self.metrics.tests_injected += 1;
                            info!(tension = %tension, cycles = state.cycles, "consequence test injected");
                            interventions.push(Intervention {
                                kind: InterventionKind::ConsequenceTest,
                                prompt,
                                tension: tension.clone(),
                                turn,
                                triggered_by: speaker.to_string(),
                                cycles: state.cycles,
                            });
                        }
                    }
                    Err(e) => warn!(tension = %tension, error = %e, "consequence test skipped"),
                }
            } else if state.can_emit_pivot() {
                let failed: Vec<ConsequenceTest> =
                    state.episode_tests().filter(|t| t.is_failed()).cloned().collect();
                let prompt = self
                    .generator
                    .generate_synthesis_prompt(tension, &failed, summary);
                state.record_pivot(turn);
                self.last_pivot_turn = Some(turn);
                self.metrics.pivots_forced += 1;
                info!(tension = %tension, failed = failed.len(), "pivot forced");
                interventions.push(Intervention {
                    kind: InterventionKind::Pivot,
                    prompt,
                    tension: tension.clone(),
                    turn,
                    triggered_by: speaker.to_string(),
                    cycles: state.cycles,
                });
            }
        }

        if let Some(focus) = active
            .iter()
            .max_by_key(|t| self.tensions.get(*t).map_or(0, |s| s.cycles))
        {
            self.current_tension = Some(focus.clone());
        }

        let saturated = self.saturated_count();
        if saturated > 1 {
            self.metrics.orbit_count += 1;
            debug!(saturated, "orbit detected");
        }

        self.resolve_pending_tests(content, turn);

        if let Some(synthesis) = self.check_synthesis(turn, speaker, summary) {
            interventions.push(synthesis);
        }

        for i in &interventions {
            if self.recent_interventions.len() == RECENT_INTERVENTIONS {
                self.recent_interventions.pop_front();
            }
            self.recent_interventions.push_back(i.clone());
        }

        TurnOutcome {
            processed: true,
            interventions,
            snapshot: TurnSnapshot {
                turn,
                active_tensions: active.into_iter().collect(),
                entailments,
                strongest_entailment: strongest,
                saturated_tensions: saturated,
                metrics: self.metrics.clone(),
            },
        }
    }

    /// Match this turn against tests issued on earlier turns.
    fn resolve_pending_tests(&mut self, content: &str, turn: u64) {
        let strict = self.config.entailment_required;
        let timeout = self.config.test_timeout_turns;
        let mut still_pending = Vec::with_capacity(self.pending_tests.len());

        for pending in std::mem::take(&mut self.pending_tests) {
            let Some(state) = self.tensions.get_mut(&pending.tension) else {
                continue;
            };
            let Some(test) = state.consequence_tests.get(pending.index) else {
                continue;
            };
            if !test.is_pending() {
                continue;
            }
            let issued = test.turn;
            if issued >= turn {
                still_pending.push(pending);
                continue;
            }
            if turn - issued > timeout {
                state.resolve_test(pending.index, false);
                debug!(tension = %pending.tension, issued, "consequence test timed out");
                continue;
            }

            let validation = self
                .detector
                .validate_consequence_response(&test.prompt, content);
            let answered = if strict {
                validation.addresses_test
            } else {
                validation.addresses_test || validation.quality_score >= 2
            };
            if !answered {
                still_pending.push(pending);
                continue;
            }

            let progressed = validation.has_entailments;
            state.resolve_test(pending.index, progressed);
            if progressed {
                state.record_entailment(turn);
            }
            debug!(
                tension = %pending.tension,
                progressed,
                score = validation.quality_score,
                "consequence test resolved"
            );
        }

        self.pending_tests = still_pending;
    }

    /// Safety-valve synthesis once the discussion has gone too long without a pivot.
    fn check_synthesis(&mut self, turn: u64, speaker: &str, summary: &str) -> Option<Intervention> {
        let interval = self.config.synthesis_interval;
        if interval == 0 {
            return None;
        }
        let last = self.last_pivot_turn?;
        if turn.saturating_sub(last) <= interval {
            return None;
        }

        let (tension, state) = self
            .tensions
            .iter()
            .max_by_key(|(_, s)| s.cycles as usize + s.consequence_tests.len())?;
        let failed: Vec<ConsequenceTest> =
            state.episode_tests().filter(|t| t.is_failed()).cloned().collect();
        let prompt = self
            .generator
            .generate_synthesis_prompt(tension, &failed, summary);
        let intervention = Intervention {
            kind: InterventionKind::Synthesis,
            prompt,
            tension: tension.clone(),
            turn,
            triggered_by: speaker.to_string(),
            cycles: state.cycles,
        };

        self.last_pivot_turn = Some(turn);
        self.metrics.syntheses_emitted += 1;
        info!(tension = %intervention.tension, since = turn - last, "periodic synthesis");
        Some(intervention)
    }

    fn limits(&self) -> (u32, u32) {
        (self.config.cycles_threshold, self.config.max_consequence_tests)
    }

    fn saturated_count(&self) -> usize {
        self.tensions.values().filter(|s| s.is_saturated()).count()
    }

    /// Clear all tension state and counters. Configuration is kept.
    pub fn reset(&mut self) {
        self.tensions.clear();
        self.turn_index = 0;
        self.last_pivot_turn = None;
        self.current_tension = None;
        self.recent_topics.clear();
        self.pending_tests.clear();
        self.metrics = ProgressionMetrics::default();
        self.recent_interventions.clear();
        info!("progression state reset");
    }

    /// Forget one tension. Returns false if it was not tracked.
    pub fn reset_tension(&mut self, tension: &TensionPair) -> bool {
        if self.tensions.remove(tension).is_none() {
            return false;
        }
        self.pending_tests.retain(|p| &p.tension != tension);
        if self.current_tension.as_ref() == Some(tension) {
            self.current_tension = None;
        }
        debug!(tension = %tension, "tension reset");
        true
    }

    /// Full status report.
    pub fn status_report(&self) -> ProgressionReport {
        ProgressionReport {
            config: self.config.clone(),
            state: StateSummary {
                turn_index: self.turn_index,
                last_pivot_turn: self.last_pivot_turn,
                current_tension: self.current_tension.as_ref().map(TensionPair::key),
                tracked_tensions: self.tensions.len(),
                pending_tests: self.pending_tests.len(),
                enhancer_enabled: self.generator.has_enhancer(),
            },
            tensions: self
                .tensions
                .iter()
                .map(|(pair, state)| (pair.key(), TensionReport::from(state)))
                .collect(),
            metrics: self.metrics.clone(),
            recent_interventions: self.recent_interventions.iter().cloned().collect(),
        }
    }

    /// Snapshot the current state.
    pub fn checkpoint(&self) -> ProgressionCheckpoint {
        ProgressionCheckpoint {
            turn_index: self.turn_index,
            last_pivot_turn: self.last_pivot_turn,
            current_tension: self.current_tension.as_ref().map(TensionPair::key),
            metrics: self.metrics.clone(),
            tensions: self
                .tensions
                .iter()
                .map(|(pair, state)| (pair.key(), state.clone()))
                .collect(),
            recent_topics: self.recent_topics.iter().cloned().collect(),
            ..Default::default()
        }
    }

    /// Replace the current state with a checkpoint.
    ///
    /// Thresholds come from this controller's configuration. Pending tests are
    /// rebuilt from unresolved records.
    pub fn restore(&mut self, checkpoint: ProgressionCheckpoint) {
        let (max_cycles, max_tests) = self.limits();

        self.tensions.clear();
        self.pending_tests.clear();
        for (pair, state) in checkpoint.parsed_tensions() {
            let mut state = state.clone();
            state.set_limits(max_cycles, max_tests);
            for (index, test) in state.consequence_tests.iter().enumerate() {
                if test.is_pending() {
                    self.pending_tests.push(PendingTest {
                        tension: pair.clone(),
                        index,
                    });
                }
            }
            self.tensions.insert(pair, state);
        }

        self.turn_index = checkpoint.turn_index;
        self.last_pivot_turn = checkpoint.last_pivot_turn;
        self.current_tension = checkpoint
            .current_tension
            .as_deref()
            .and_then(TensionPair::from_key);
        self.metrics = checkpoint.metrics;
        self.recent_topics = checkpoint.recent_topics.into_iter().collect();
        self.recent_interventions.clear();
        debug!(
            turn = self.turn_index,
            tensions = self.tensions.len(),
            pending = self.pending_tests.len(),
            "progression state restored"
        );
    }

    /// Write the current state to `path` as JSON.
    pub fn save_state(&self, path: &Path) -> ProgressionResult<()> {
        self.checkpoint().save(path)?;
        info!(path = %path.display(), turn = self.turn_index, "progression state saved");
        Ok(())
    }

    /// Load state from `path`, replacing the current state.
    pub fn load_state(&mut self, path: &Path) -> ProgressionResult<IntegrityStatus> {
        let (checkpoint, status) = ProgressionCheckpoint::load(path)?;
        if let IntegrityStatus::Recoverable { warnings } = &status {
            for w in warnings {
                warn!(path = %path.display(), warning = %w, "checkpoint inconsistency");
            }
        }
        self.restore(checkpoint);
        info!(path = %path.display(), turn = self.turn_index, "progression state loaded");
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> ProgressionController {
        ProgressionController::new(ProgressionConfig::default()).unwrap()
    }

    fn necessity() -> TensionPair {
        TensionPair::new("necessity", "contingency")
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let config = ProgressionConfig {
            cycles_threshold: 0,
            ..Default::default()
        };
        assert!(ProgressionController::new(config).is_err());
    }

    #[tokio::test]
    async fn test_entailment_resets_cycles() {
        let mut c = controller();
        let ctx = TurnContext::default();
        c.process_turn(
            "Everything is necessary, yet much seems contingent.",
            "A",
            &ctx,
        )
        .await;
        assert_eq!(c.tension_state(&necessity()).unwrap().cycles, 1);

        let outcome = c
            .process_turn(
                "If all is necessary, then chance is only our ignorance of causes.",
                "B",
                &ctx,
            )
            .await;
        assert!(!outcome.snapshot.entailments.is_empty());
        let state = c.tension_state(&necessity()).unwrap();
        assert_eq!(state.cycles, 0);
        assert_eq!(state.last_new_entailment_turn, Some(2));
    }

    #[tokio::test]
    async fn test_turn_without_tensions_still_counts() {
        let mut c = controller();
        let outcome = c
            .process_turn("Good morning to you all.", "A", &TurnContext::default())
            .await;
        assert!(outcome.processed);
        assert!(outcome.interventions.is_empty());
        assert!(outcome.snapshot.active_tensions.is_empty());
        assert_eq!(c.turn_index(), 1);
        assert_eq!(c.metrics().turns_processed, 1);
    }

    #[tokio::test]
    async fn test_reset_tension_drops_pending_tests() {
        let mut c = controller();
        let ctx = TurnContext::default();
        for _ in 0..2 {
            c.process_turn(
                "Everything is necessary, yet much seems contingent.",
                "A",
                &ctx,
            )
            .await;
        }
        assert_eq!(c.pending_test_count(), 1);
        assert!(c.reset_tension(&necessity()));
        assert_eq!(c.pending_test_count(), 0);
        assert!(c.tension_state(&necessity()).is_none());
        assert!(!c.reset_tension(&necessity()));
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let mut c = controller();
        let ctx = TurnContext::default();
        for _ in 0..3 {
            c.process_turn(
                "Everything is necessary, yet much seems contingent.",
                "A",
                &ctx,
            )
            .await;
        }
        c.reset();
        assert_eq!(c.turn_index(), 0);
        assert!(c.tensions().is_empty());
        assert_eq!(c.metrics(), &ProgressionMetrics::default());
        assert_eq!(c.recent_interventions().count(), 0);
        assert_eq!(c.config(), &ProgressionConfig::default());
    }

    #[tokio::test]
    async fn test_checkpoint_restore_rebuilds_pending() {
        let mut c = controller();
        let ctx = TurnContext::default();
        for _ in 0..2 {
            c.process_turn(
                "Everything is necessary, yet much seems contingent.",
                "A",
                &ctx,
            )
            .await;
        }
        let cp = c.checkpoint();

        let mut fresh = controller();
        fresh.restore(cp);
        assert_eq!(fresh.turn_index(), 2);
        assert_eq!(fresh.pending_test_count(), 1);
        assert_eq!(fresh.current_tension(), Some(&necessity()));
        assert_eq!(fresh.tension_state(&necessity()).unwrap().max_cycles(), 2);
    }
}
