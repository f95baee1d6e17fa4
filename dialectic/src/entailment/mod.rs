//! Entailment Detection
//!
//! Lexical detection of four kinds of substantive content: logical
//! implication, concrete application, counterexample, and testable
//! prediction. Also validates whether a reply actually engages a
//! consequence test.

pub mod detector;
pub mod markers;

pub use detector::{ConsequenceValidation, EntailmentDetector, MIN_SHARED_TERMS};
pub use markers::EntailmentKind;
