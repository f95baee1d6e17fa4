//! Concept/Tension Extraction
//!
//! Maps free text to recognized philosophical concepts and detects which
//! configured opposed pairs ("tensions") are jointly active across a short
//! window of recent turns.

pub mod extractor;
pub mod lexicon;

pub use extractor::ConceptExtractor;
pub use lexicon::{ConceptEntry, ConceptLexicon, TensionPair};
