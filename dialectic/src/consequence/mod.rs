//! Consequence Test Generation
//!
//! Turns an orbiting tension plus the current claim into a one-sentence
//! prompt demanding a concrete, falsifiable implication. Falls back to a
//! fixed template bank whenever the optional [`Enhancer`] is absent or fails,
//! and builds synthesis/pivot prompts once tests have failed repeatedly.

pub mod enhancer;
pub mod generator;
pub mod templates;

pub use enhancer::{normalize_enhanced, ChatEnhancer, EnhanceRequest, Enhancer};
pub use generator::{
    short_claim, ConsequenceGenerator, TestContext, MAX_CLAIM_CHARS, SYNTHESIS_PREFIX, TEST_PREFIX,
};
pub use templates::{template_overlap, TemplateBank, SIMILARITY_THRESHOLD};
