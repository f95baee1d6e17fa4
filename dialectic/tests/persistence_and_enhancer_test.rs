//! Checkpoint/resume and consequence-test enhancement through the controller.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dialectic::{
    EnhanceError, EnhanceRequest, Enhancer, IntegrityStatus, InterventionKind, ProgressionConfig,
    ProgressionController, ProgressionError, TensionPair, TurnContext, TEST_PREFIX,
};

const OPENING: &str = "Everything in the world is necessary, and nothing is contingent.";
const DENIAL: &str = "No, the world is contingent; necessity is a story we tell.";
const RESTATE_A: &str = "The world is necessary; contingency in the world is merely a story.";
const RESTATE_B: &str = "Contingency rules the world, and necessary truths are few.";
const RESTATE_C: &str = "The world is necessary and contingency is nothing.";

fn necessity() -> TensionPair {
    TensionPair::new("necessity", "contingency")
}

fn mock_controller() -> ProgressionController {
    ProgressionController::new(ProgressionConfig::default()).unwrap()
}

async fn feed(controller: &mut ProgressionController, turns: &[&str]) -> Vec<InterventionKind> {
    let ctx = TurnContext::with_summary("Spinoza and Hume on whether anything could be otherwise.");
    let mut kinds = Vec::new();
    for turn in turns {
        let outcome = controller.process_turn(turn, "speaker", &ctx).await;
        kinds.extend(outcome.interventions.iter().map(|i| i.kind));
    }
    kinds
}

/// Enhancer returning a fixed line and counting calls.
struct MockEnhancer {
    reply: Result<String, String>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Enhancer for MockEnhancer {
    async fn enhance(&self, request: &EnhanceRequest<'_>) -> Result<String, EnhanceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(!request.previous_tests.is_empty());
        assert!(request.prompt.starts_with(TEST_PREFIX));
        self.reply.clone().map_err(EnhanceError::RequestFailed)
    }
}

fn mock_enhancer(reply: Result<&str, &str>) -> (Box<dyn Enhancer>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let enhancer = MockEnhancer {
        reply: reply.map(str::to_string).map_err(str::to_string),
        calls: Arc::clone(&calls),
    };
    (Box::new(enhancer), calls)
}

// ── Persistence ────────────────────────────────────────────────────

#[tokio::test]
async fn test_resume_mid_orbit_reaches_same_pivot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progression.json");

    let mut first = mock_controller();
    feed(&mut first, &[OPENING, DENIAL, RESTATE_A]).await;
    first.save_state(&path).unwrap();

    let mut resumed = mock_controller();
    let status = resumed.load_state(&path).unwrap();
    assert_eq!(status, IntegrityStatus::Valid);
    assert_eq!(resumed.turn_index(), 3);
    assert_eq!(resumed.pending_test_count(), 1);
    assert_eq!(resumed.metrics(), first.metrics());

    let kinds = feed(&mut resumed, &[RESTATE_B, RESTATE_C]).await;
    assert_eq!(kinds, vec![InterventionKind::Pivot]);
    assert_eq!(resumed.metrics().pivots_forced, 1);
    assert_eq!(resumed.metrics().tests_injected, 2);
}

#[tokio::test]
async fn test_load_state_defaults_missing_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sparse.json");
    std::fs::write(
        &path,
        r#"{
            "turn_index": 4,
            "tensions": {
                "contingency/necessity": {
                    "cycles": 2,
                    "consequence_tests": [{"turn": 4, "prompt": "Consequence Test: what follows?"}]
                }
            }
        }"#,
    )
    .unwrap();

    let mut c = mock_controller();
    let status = c.load_state(&path).unwrap();
    assert!(status.can_resume());
    assert_eq!(c.turn_index(), 4);
    assert_eq!(c.pending_test_count(), 1);
    assert_eq!(c.metrics().turns_processed, 0);

    let state = c.tension_state(&necessity()).unwrap();
    assert_eq!(state.cycles, 2);
    assert_eq!(state.max_cycles(), 2);
    assert!(!state.needs_pivot);
}

#[tokio::test]
async fn test_load_state_rejects_corrupted_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{"turn_index": 2, "last_pivot_turn": 9}"#).unwrap();

    let mut c = mock_controller();
    feed(&mut c, &[OPENING]).await;
    let err = c.load_state(&path).unwrap_err();
    assert!(matches!(err, ProgressionError::IntegrityCheckFailed(_)));
    // Failed loads leave the current state alone.
    assert_eq!(c.turn_index(), 1);
}

#[tokio::test]
async fn test_load_state_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.json");
    std::fs::write(&path, "not json").unwrap();

    let mut c = mock_controller();
    assert!(matches!(
        c.load_state(&path),
        Err(ProgressionError::Serialization(_))
    ));
}

// ── Enhancement ────────────────────────────────────────────────────

#[tokio::test]
async fn test_enhancer_used_for_follow_up_tests() {
    let (enhancer, calls) = mock_enhancer(Ok(
        "Consequence Test: Which laboratory result would have to be impossible?",
    ));
    let mut c = mock_controller().with_enhancer(enhancer);
    assert!(c.status_report().state.enhancer_enabled);

    let ctx = TurnContext::default();
    let t2 = {
        c.process_turn(OPENING, "A", &ctx).await;
        c.process_turn(DENIAL, "B", &ctx).await
    };
    // First test has no history to improve on.
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!t2.interventions[0].prompt.contains("laboratory"));

    let t3 = c.process_turn(RESTATE_A, "A", &ctx).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        t3.interventions[0].prompt,
        "Consequence Test: Which laboratory result would have to be impossible?"
    );
}

#[tokio::test]
async fn test_enhancer_failure_falls_back_to_template() {
    let (enhancer, calls) = mock_enhancer(Err("connection refused"));
    let mut c = mock_controller().with_enhancer(enhancer);

    let kinds = feed(&mut c, &[OPENING, DENIAL, RESTATE_A]).await;
    assert_eq!(
        kinds,
        vec![
            InterventionKind::ConsequenceTest,
            InterventionKind::ConsequenceTest
        ]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let state = c.tension_state(&necessity()).unwrap();
    let second = &state.consequence_tests[1].prompt;
    assert!(second.starts_with(TEST_PREFIX));
    assert!(second.contains("personal identity"));
}

#[tokio::test]
async fn test_unprefixed_enhancer_output_is_rejected() {
    let (enhancer, _calls) = mock_enhancer(Ok("Just some chatter."));
    let mut c = mock_controller().with_enhancer(enhancer);
    feed(&mut c, &[OPENING, DENIAL, RESTATE_A]).await;

    let state = c.tension_state(&necessity()).unwrap();
    assert!(state.consequence_tests[1].prompt.starts_with(TEST_PREFIX));
    assert!(!state.consequence_tests[1].prompt.contains("chatter"));
}
