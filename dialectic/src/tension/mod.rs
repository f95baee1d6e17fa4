//! Tension State
//!
//! One record per canonical tension pair, tracking no-progress cycles,
//! the consequence tests issued for it, and whether it needs a pivot.

pub mod state;

pub use state::{ConsequenceTest, TensionPhase, TensionState};
