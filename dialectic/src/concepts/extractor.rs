//! Concept and tension extraction over free text.

use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;

use super::lexicon::{ConceptLexicon, TensionPair};
use crate::error::{ProgressionError, ProgressionResult};

struct ConceptMatcher {
    name: String,
    keywords: Option<Regex>,
    phrases: Vec<String>,
}

impl ConceptMatcher {
    fn matches(&self, text: &str, lowered: &str) -> bool {
        if let Some(re) = &self.keywords {
            if re.is_match(text) {
                return true;
            }
        }
        self.phrases.iter().any(|p| lowered.contains(p.as_str()))
    }
}

/// Maps text to concepts and to jointly active tensions.
///
/// Keywords match case-insensitively on word boundaries; phrases match as
/// case-insensitive substrings. Extraction is pure.
pub struct ConceptExtractor {
    matchers: Vec<ConceptMatcher>,
    tensions: Vec<TensionPair>,
}

impl ConceptExtractor {
    /// Compile the lexicon into matchers.
    pub fn new(lexicon: &ConceptLexicon) -> ProgressionResult<Self> {
        let mut matchers = Vec::with_capacity(lexicon.concepts.len());
        for entry in &lexicon.concepts {
            let alternatives: Vec<String> = entry
                .keywords
                .iter()
                .map(|k| k.trim())
                .filter(|k| !k.is_empty())
                .map(regex::escape)
                .collect();

            let keywords = if alternatives.is_empty() {
                None
            } else {
                let pattern = format!(r"\b(?:{})\b", alternatives.join("|"));
                let re = RegexBuilder::new(&pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ProgressionError::Pattern {
                        concept: entry.name.clone(),
                        source,
                    })?;
                Some(re)
            };

            matchers.push(ConceptMatcher {
                name: entry.name.clone(),
                keywords,
                phrases: entry
                    .phrases
                    .iter()
                    .map(|p| p.trim().to_lowercase())
                    .filter(|p| !p.is_empty())
                    .collect(),
            });
        }

        Ok(Self {
            matchers,
            tensions: lexicon.valid_tensions().cloned().collect(),
        })
    }

    /// Extractor over the built-in philosophical lexicon.
    pub fn with_default_lexicon() -> Self {
        Self::new(&ConceptLexicon::default()).expect("built-in lexicon patterns should compile")
    }

    /// Configured tensions, in configuration order.
    pub fn tensions(&self) -> &[TensionPair] {
        &self.tensions
    }

    /// Every concept signalled anywhere in `text`.
    pub fn extract_topics(&self, text: &str) -> BTreeSet<String> {
        if text.trim().is_empty() {
            return BTreeSet::new();
        }
        let lowered = text.to_lowercase();
        self.matchers
            .iter()
            .filter(|m| m.matches(text, &lowered))
            .map(|m| m.name.clone())
            .collect()
    }

    /// Tensions whose poles both appear in `text` or in the last `window`
    /// entries of `recent_topics` (oldest first).
    pub fn detect_tensions(
        &self,
        text: &str,
        recent_topics: &[BTreeSet<String>],
        window: usize,
    ) -> BTreeSet<TensionPair> {
        let mut topics = self.extract_topics(text);
        let skip = recent_topics.len().saturating_sub(window);
        for prior in &recent_topics[skip..] {
            topics.extend(prior.iter().cloned());
        }
        self.tensions_among(&topics)
    }

    /// Tensions fully covered by an already-extracted topic set.
    pub fn tensions_among(&self, topics: &BTreeSet<String>) -> BTreeSet<TensionPair> {
        self.tensions
            .iter()
            .filter(|t| topics.contains(t.first()) && topics.contains(t.second()))
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for ConceptExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConceptExtractor")
            .field("concepts", &self.matchers.len())
            .field("tensions", &self.tensions)
            .finish()
    }
}
