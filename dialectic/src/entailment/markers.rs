//! Curated marker patterns for substantive-content detection.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Kind of substantive content found in a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntailmentKind {
    /// Logical implication ("if ... then", "therefore")
    Implication,
    /// Concrete application ("for example", "in practice")
    Application,
    /// Counterexample or exception ("however", "unless")
    Counterexample,
    /// Testable prediction ("we could test", "falsifiable by")
    Test,
}

impl EntailmentKind {
    /// All kinds, strongest first.
    pub const BY_STRENGTH: [EntailmentKind; 4] = [
        EntailmentKind::Test,
        EntailmentKind::Application,
        EntailmentKind::Implication,
        EntailmentKind::Counterexample,
    ];

    /// Higher is stronger evidence of forward progress.
    pub fn strength(self) -> u8 {
        match self {
            Self::Test => 4,
            Self::Application => 3,
            Self::Implication => 2,
            Self::Counterexample => 1,
        }
    }

    pub(crate) fn pattern(self) -> &'static Regex {
        match self {
            Self::Implication => &IMPLICATION_PATTERN,
            Self::Application => &APPLICATION_PATTERN,
            Self::Counterexample => &COUNTEREXAMPLE_PATTERN,
            Self::Test => &TEST_PATTERN,
        }
    }
}

impl std::fmt::Display for EntailmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Implication => write!(f, "implication"),
            Self::Application => write!(f, "application"),
            Self::Counterexample => write!(f, "counterexample"),
            Self::Test => write!(f, "test"),
        }
    }
}

static IMPLICATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bif\b[^.?!]{0,80}?\bthen\b|\b(?:therefore|thus|hence|consequently|accordingly)\b|\bit follows\b|\bfollows from\b|\bwhich (?:means|implies|entails)\b|\b(?:implies|entails)\b|\bso it must\b",
    )
    .expect("IMPLICATION_PATTERN regex should compile")
});

static APPLICATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bfor (?:example|instance)\b|\bin practice\b|\bconcretely\b|\bwe (?:ought to|should)\b|\bconsider the case\b|\bin the case of\b|\bimagine (?:a|an|someone|that)\b|\bsuch as\b|\bin real life\b|\bapplied to\b",
    )
    .expect("APPLICATION_PATTERN regex should compile")
});

static COUNTEREXAMPLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bhowever\b|\bunless\b|\bwhat if instead\b|\bbut consider\b|\bcounter-?example\b|\bon the contrary\b|\bexcept (?:when|where|if)\b|\bfails (?:when|if|for)\b|\bnot always\b",
    )
    .expect("COUNTEREXAMPLE_PATTERN regex should compile")
});

static TEST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bwe could test\b|\btest (?:this|that|it)\b|\bmeasur(?:able|ably|ed)\b|\bfalsifi(?:able|ed|es)\b|\bfalsify\b|\bwould predict\b|\bprediction\b|\bwe would (?:see|observe|expect|find)\b|\bexperiment(?:s|al)?\b|\bobservable\b|\bevidence (?:that|would|against)\b",
    )
    .expect("TEST_PATTERN regex should compile")
});

/// Phrasing that frames a reply as a consequence, independent of kind.
pub(crate) static CONSEQUENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bwould (?:lead|result|mean|require|show|imply|change|follow|force)\b|\b(?:the|a) (?:consequence|result|upshot)\b|\bthis means\b|\bwe would\b|\bthen\b|\bwould (?:have|need) to\b",
    )
    .expect("CONSEQUENCE_PATTERN regex should compile")
});

/// Words ignored when measuring overlap between a test and its reply.
pub(crate) const STOPWORDS: &[&str] = &[
    "about", "also", "because", "been", "being", "could", "does", "each", "even", "from",
    "have", "into", "just", "like", "more", "most", "much", "only", "other", "over", "same",
    "should", "some", "such", "than", "that", "their", "them", "then", "there", "these",
    "they", "this", "those", "very", "were", "what", "when", "where", "which", "while",
    "with", "would", "your", "consequence", "test",
];
