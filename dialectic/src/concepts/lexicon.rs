//! Concept lexicon and the configured list of opposed concept pairs.

use serde::{Deserialize, Serialize};

/// An unordered pair of opposed concepts, stored in sorted order.
///
/// `TensionPair::new("necessity", "contingency")` and
/// `TensionPair::new("contingency", "necessity")` are the same tension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct TensionPair(String, String);

impl TensionPair {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn first(&self) -> &str {
        &self.0
    }

    pub fn second(&self) -> &str {
        &self.1
    }

    /// Map key used in reports and checkpoints: `"<a>/<b>"`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.0, self.1)
    }

    /// Inverse of [`TensionPair::key`].
    pub fn from_key(key: &str) -> Option<Self> {
        let (a, b) = key.split_once('/')?;
        let (a, b) = (a.trim(), b.trim());
        if a.is_empty() || b.is_empty() {
            return None;
        }
        Some(Self::new(a, b))
    }

    pub fn contains(&self, concept: &str) -> bool {
        self.0 == concept || self.1 == concept
    }

    /// Whether the two tensions have any pole in common.
    pub fn shares_pole(&self, other: &TensionPair) -> bool {
        self.contains(&other.0) || self.contains(&other.1)
    }
}

impl From<(String, String)> for TensionPair {
    fn from((a, b): (String, String)) -> Self {
        Self::new(a, b)
    }
}

impl From<TensionPair> for (String, String) {
    fn from(pair: TensionPair) -> Self {
        (pair.0, pair.1)
    }
}

impl std::fmt::Display for TensionPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.0, self.1)
    }
}

/// Keywords (whole-word) and phrases (substring) signalling one concept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptEntry {
    pub name: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub phrases: Vec<String>,
}

impl ConceptEntry {
    pub fn new(name: &str, keywords: &[&str], phrases: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            phrases: phrases.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Immutable concept vocabulary plus the tensions defined over it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptLexicon {
    pub concepts: Vec<ConceptEntry>,
    pub tensions: Vec<TensionPair>,
}

impl ConceptLexicon {
    pub fn new(concepts: Vec<ConceptEntry>, tensions: Vec<TensionPair>) -> Self {
        Self { concepts, tensions }
    }

    pub fn concept(&self, name: &str) -> Option<&ConceptEntry> {
        self.concepts.iter().find(|c| c.name == name)
    }

    /// Tensions whose poles are both defined concepts.
    pub fn valid_tensions(&self) -> impl Iterator<Item = &TensionPair> {
        self.tensions
            .iter()
            .filter(|t| self.concept(t.first()).is_some() && self.concept(t.second()).is_some())
    }
}

impl Default for ConceptLexicon {
    fn default() -> Self {
        let concepts = vec![
            ConceptEntry::new(
                "necessity",
                &[
                    "necessity",
                    "necessary",
                    "necessarily",
                    "inevitable",
                    "inevitability",
                    "unavoidable",
                    "fated",
                ],
                &["could not have been otherwise", "had to happen", "bound to happen"],
            ),
            ConceptEntry::new(
                "contingency",
                &[
                    "contingency",
                    "contingent",
                    "chance",
                    "accident",
                    "accidental",
                    "random",
                    "arbitrary",
                ],
                &["could have been otherwise", "might not have", "by chance"],
            ),
            ConceptEntry::new(
                "freedom",
                &["freedom", "free", "liberty", "autonomy", "autonomous", "choice", "choose"],
                &["free will", "free choice", "could have chosen"],
            ),
            ConceptEntry::new(
                "determinism",
                &[
                    "determinism",
                    "determined",
                    "deterministic",
                    "predetermined",
                    "causation",
                    "causal",
                ],
                &["laws of physics", "prior causes", "caused by"],
            ),
            ConceptEntry::new(
                "individual",
                &["individual", "individuals", "individuality", "oneself", "personal"],
                &["the individual", "each person"],
            ),
            ConceptEntry::new(
                "collective",
                &["collective", "society", "community", "communal", "social"],
                &["common good", "the people"],
            ),
            ConceptEntry::new(
                "reason",
                &["reason", "rational", "rationality", "logic", "logical"],
                &["pure reason", "cold logic"],
            ),
            ConceptEntry::new(
                "passion",
                &["passion", "passions", "emotion", "emotions", "feeling", "feelings", "desire", "instinct"],
                &["gut feeling", "the heart wants"],
            ),
            ConceptEntry::new(
                "being",
                &["permanence", "permanent", "unchanging", "eternal", "essence", "immutable"],
                &["pure being", "stays the same"],
            ),
            ConceptEntry::new(
                "becoming",
                &["becoming", "change", "flux", "impermanence", "transformation", "process"],
                &["everything flows", "never the same river"],
            ),
            ConceptEntry::new(
                "universal",
                &["universal", "universals", "absolute", "objective"],
                &["for everyone", "in all cases"],
            ),
            ConceptEntry::new(
                "particular",
                &["particular", "particulars", "relative", "subjective", "situational"],
                &["depends on context", "case by case"],
            ),
            ConceptEntry::new(
                "mind",
                &["mind", "minds", "consciousness", "conscious", "mental", "soul"],
                &["inner life", "subjective experience"],
            ),
            ConceptEntry::new(
                "body",
                &["body", "bodies", "physical", "material", "matter", "brain", "flesh"],
                &["physical world", "neural activity"],
            ),
            ConceptEntry::new(
                "appearance",
                &["appearance", "appearances", "perception", "illusion", "phenomena", "seems"],
                &["seems to", "what we perceive"],
            ),
            ConceptEntry::new(
                "reality",
                &["reality", "real", "noumenal", "actuality"],
                &["thing in itself", "as it truly is"],
            ),
            ConceptEntry::new(
                "certainty",
                &["certainty", "certain", "proof", "indubitable", "justified"],
                &["beyond doubt", "know for sure"],
            ),
            ConceptEntry::new(
                "doubt",
                &["doubt", "skepticism", "scepticism", "skeptical", "uncertain", "uncertainty", "fallible"],
                &["we cannot know", "might be wrong"],
            ),
            ConceptEntry::new(
                "duty",
                &["duty", "duties", "obligation", "obligations", "deontological", "principle"],
                &["categorical imperative", "right in itself"],
            ),
            ConceptEntry::new(
                "utility",
                &["utility", "happiness", "welfare", "wellbeing", "utilitarian", "outcomes"],
                &["greatest good", "greatest number"],
            ),
        ];

        let tensions = [
            ("necessity", "contingency"),
            ("freedom", "determinism"),
            ("individual", "collective"),
            ("reason", "passion"),
            ("being", "becoming"),
            ("universal", "particular"),
            ("mind", "body"),
            ("appearance", "reality"),
            ("certainty", "doubt"),
            ("duty", "utility"),
        ]
        .into_iter()
        .map(|(a, b)| TensionPair::new(a, b))
        .collect();

        Self::new(concepts, tensions)
    }
}
