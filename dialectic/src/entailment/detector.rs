//! Entailment detection and consequence-test reply validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::markers::{EntailmentKind, CONSEQUENCE_PATTERN, STOPWORDS};

/// Minimum shared content words for a reply to count as addressing a test.
pub const MIN_SHARED_TERMS: usize = 2;

/// Result of checking a reply against a consequence test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsequenceValidation {
    pub has_entailments: bool,
    pub entailment_types: BTreeSet<EntailmentKind>,
    /// Reply is framed as a consequence ("would lead to", "this means").
    pub has_consequence_pattern: bool,
    /// Reply shares enough content words with the test prompt.
    pub addresses_test: bool,
    pub shared_terms: BTreeSet<String>,
    /// Kind count, plus one for consequence framing, plus one for addressing the test.
    pub quality_score: u32,
}

/// Scans text for markers of substantive content.
#[derive(Debug, Clone)]
pub struct EntailmentDetector {
    /// Texts with fewer words than this never carry entailments.
    min_words: usize,
}

impl Default for EntailmentDetector {
    fn default() -> Self {
        Self { min_words: 3 }
    }
}

impl EntailmentDetector {
    pub fn new(min_words: usize) -> Self {
        Self { min_words }
    }

    /// Every entailment kind whose markers appear in `text`.
    pub fn detect(&self, text: &str) -> BTreeSet<EntailmentKind> {
        if text.split_whitespace().count() < self.min_words {
            return BTreeSet::new();
        }
        EntailmentKind::BY_STRENGTH
            .into_iter()
            .filter(|kind| kind.pattern().is_match(text))
            .collect()
    }

    pub fn has_entailment(&self, text: &str) -> bool {
        !self.detect(text).is_empty()
    }

    /// The single most valuable kind present:
    /// test > application > implication > counterexample.
    pub fn get_strongest_entailment(&self, text: &str) -> Option<EntailmentKind> {
        self.detect(text).into_iter().max_by_key(|k| k.strength())
    }

    /// Check whether `response` engages `test_prompt` and carries new content.
    pub fn validate_consequence_response(
        &self,
        test_prompt: &str,
        response: &str,
    ) -> ConsequenceValidation {
        let entailment_types = self.detect(response);
        let has_consequence_pattern = response.split_whitespace().count() >= self.min_words
            && CONSEQUENCE_PATTERN.is_match(response);

        let prompt_terms = content_words(test_prompt);
        let shared_terms: BTreeSet<String> = content_words(response)
            .intersection(&prompt_terms)
            .cloned()
            .collect();
        let addresses_test = shared_terms.len() >= MIN_SHARED_TERMS;

        let quality_score = entailment_types.len() as u32
            + u32::from(has_consequence_pattern)
            + u32::from(addresses_test);

        ConsequenceValidation {
            has_entailments: !entailment_types.is_empty(),
            entailment_types,
            has_consequence_pattern,
            addresses_test,
            shared_terms,
            quality_score,
        }
    }
}

/// Lowercased words longer than three characters, minus stopwords.
pub(crate) fn content_words(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 3)
        .map(|w| w.to_lowercase())
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}
