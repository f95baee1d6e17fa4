//! Dialectical Progression Engine
//!
//! Watches a multi-party philosophical discussion turn by turn and keeps it
//! from orbiting the same opposition without producing new content.
//!
//! - [`concepts`]: maps text to concepts and to jointly active tensions
//! - [`entailment`]: detects implications, applications, counterexamples, and
//!   testable predictions, and checks whether a reply engages a test
//! - [`tension`]: per-tension cycle and consequence-test state
//! - [`consequence`]: consequence-test and synthesis prompt generation, with an
//!   optional language-model enhancer
//! - [`progression`]: the per-turn controller, checkpoints, and status reports
//!
//! # Usage
//!
//! ```no_run
//! use dialectic::{ProgressionConfig, ProgressionController, TurnContext};
//!
//! # async fn run() -> dialectic::ProgressionResult<()> {
//! let mut controller = ProgressionController::new(ProgressionConfig::from_env())?;
//! let outcome = controller
//!     .process_turn(
//!         "Everything is necessary, yet much seems contingent.",
//!         "Spinoza",
//!         &TurnContext::default(),
//!     )
//!     .await;
//! for intervention in &outcome.interventions {
//!     println!("{}", intervention.prompt);
//! }
//! # Ok(())
//! # }
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod concepts;
pub mod config;
pub mod consequence;
pub mod entailment;
pub mod error;
pub mod progression;
pub mod tension;

pub use concepts::{ConceptEntry, ConceptExtractor, ConceptLexicon, TensionPair};
pub use config::{EnhancerConfig, ProgressionConfig};
pub use consequence::{
    ChatEnhancer, ConsequenceGenerator, EnhanceRequest, Enhancer, TemplateBank, TestContext,
    SYNTHESIS_PREFIX, TEST_PREFIX,
};
pub use entailment::{ConsequenceValidation, EntailmentDetector, EntailmentKind};
pub use error::{EnhanceError, ProgressionError, ProgressionResult};
pub use progression::{
    validate_checkpoint, IntegrityStatus, Intervention, InterventionKind, ProgressionCheckpoint,
    ProgressionController, ProgressionMetrics, ProgressionReport, TurnContext, TurnOutcome,
};
pub use tension::{ConsequenceTest, TensionPhase, TensionState};
