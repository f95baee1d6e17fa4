//! Fallback template bank and grounding domains for consequence tests.
//!
//! Templates use two placeholders: `{claim}` (a short form of the current
//! claim) and `{domain}` (the area the test is grounded in).

use std::collections::{BTreeSet, HashMap};

use crate::concepts::TensionPair;
use crate::entailment::detector::content_words;

/// Templates whose fixed wording overlaps a used prompt by at least this
/// fraction are treated as already used.
pub const SIMILARITY_THRESHOLD: f64 = 0.6;

const GENERIC_TEMPLATES: &[&str] = &[
    "If \"{claim}\" is true, what concrete, observable difference would it make in {domain}?",
    "What single example from {domain} would prove \"{claim}\" wrong?",
    "Suppose everyone acted on \"{claim}\" in {domain} for a year. What specifically changes?",
    "Which prediction about {domain} follows from \"{claim}\" that its opposite does not make?",
];

const DEFAULT_DOMAINS: &[&str] = &[
    "free will",
    "justice",
    "knowledge",
    "moral responsibility",
    "personal identity",
    "political authority",
    "scientific explanation",
    "artistic creation",
    "education",
    "medicine",
    "criminal law",
    "friendship",
];

type BankEntry = (&'static str, &'static str, [&'static str; 3], [&'static str; 3]);

const TENSION_BANKS: &[BankEntry] = &[
    (
        "necessity",
        "contingency",
        [
            "If \"{claim}\" is right, what specific outcome in {domain} could never have turned out differently, and how would we recognize it?",
            "Name one concrete event in {domain} that \"{claim}\" says was fixed in advance; what observation would show it was open after all?",
            "Suppose \"{claim}\" holds. Which practice in {domain} would have to stop making sense, and does it?",
        ],
        ["scientific explanation", "personal identity", "free will"],
    ),
    (
        "freedom",
        "determinism",
        [
            "If \"{claim}\" is true, what would a person in {domain} do differently tomorrow, and how could anyone detect that difference?",
            "Describe one decision in {domain} that \"{claim}\" would classify correctly where the opposing view fails.",
            "Granting \"{claim}\", should blame and praise in {domain} change? Name one rule that would be rewritten.",
        ],
        ["moral responsibility", "criminal law", "free will"],
    ),
    (
        "individual",
        "collective",
        [
            "If \"{claim}\" guides policy in {domain}, who concretely loses something, and what would they lose?",
            "Pick one institution within {domain}. How would it be redesigned if \"{claim}\" were taken seriously?",
            "What measurable result in {domain} would show that \"{claim}\" serves people better than its rival?",
        ],
        ["political authority", "justice", "education"],
    ),
    (
        "reason",
        "passion",
        [
            "If \"{claim}\" is correct, which decision in {domain} should be handed to feeling rather than calculation, and what happens then?",
            "Give a case from {domain} where following \"{claim}\" produces a worse result than ignoring it.",
            "What would a person who lived by \"{claim}\" do in {domain} that others would find surprising?",
        ],
        ["friendship", "artistic creation", "moral responsibility"],
    ),
    (
        "being",
        "becoming",
        [
            "If \"{claim}\" holds, what in {domain} should we expect to still find unchanged a century from now?",
            "Name something in {domain} whose identity survives total replacement of its parts according to \"{claim}\"; what is the criterion?",
            "How would {domain} be practiced differently by someone who fully accepted \"{claim}\"?",
        ],
        ["personal identity", "scientific explanation", "education"],
    ),
    (
        "universal",
        "particular",
        [
            "If \"{claim}\" is true, is there a single rule in {domain} that binds everyone everywhere? State it.",
            "Find one case in {domain} where applying \"{claim}\" uniformly yields an obviously wrong verdict.",
            "What disagreement in {domain} would \"{claim}\" settle outright, and which would it leave open?",
        ],
        ["justice", "medicine", "criminal law"],
    ),
    (
        "mind",
        "body",
        [
            "If \"{claim}\" is right, what would a complete brain scan reveal about {domain} that introspection misses?",
            "Describe an experiment touching {domain} whose result would embarrass \"{claim}\".",
            "Under \"{claim}\", could a machine participate fully in {domain}? What exactly would it need?",
        ],
        ["medicine", "personal identity", "free will"],
    ),
    (
        "appearance",
        "reality",
        [
            "If \"{claim}\" holds, how could anyone involved in {domain} ever correct a mistaken impression?",
            "Give one example from {domain} where the way things look and the way things are come apart, given \"{claim}\".",
            "What practical decision in {domain} depends on whether \"{claim}\" is accepted?",
        ],
        ["knowledge", "scientific explanation", "artistic creation"],
    ),
    (
        "certainty",
        "doubt",
        [
            "If \"{claim}\" is accepted, what may we still confidently assert about {domain}, and on what grounds?",
            "Which belief about {domain} would \"{claim}\" force us to abandon first?",
            "Describe evidence regarding {domain} that would move a reasonable person toward or away from \"{claim}\".",
        ],
        ["knowledge", "medicine", "scientific explanation"],
    ),
    (
        "duty",
        "utility",
        [
            "If \"{claim}\" is right, what should someone in {domain} do when keeping a promise makes everyone worse off?",
            "Name a policy in {domain} that \"{claim}\" endorses and its rival condemns. Who bears the cost?",
            "How would we audit, after the fact, whether an action in {domain} was justified under \"{claim}\"?",
        ],
        ["justice", "medicine", "political authority"],
    ),
];

/// Templates and domains, keyed by normalized tension pair.
#[derive(Debug, Clone)]
pub struct TemplateBank {
    tension_templates: HashMap<TensionPair, Vec<String>>,
    generic_templates: Vec<String>,
    preferred_domains: HashMap<TensionPair, Vec<String>>,
    domains: Vec<String>,
}

impl Default for TemplateBank {
    fn default() -> Self {
        let mut bank = Self::new(
            GENERIC_TEMPLATES.iter().map(|s| s.to_string()).collect(),
            DEFAULT_DOMAINS.iter().map(|s| s.to_string()).collect(),
        );
        for (a, b, templates, domains) in TENSION_BANKS {
            let pair = TensionPair::new(*a, *b);
            bank.insert_templates(pair.clone(), templates.iter().map(|s| s.to_string()).collect());
            bank.insert_domains(pair, domains.iter().map(|s| s.to_string()).collect());
        }
        bank
    }
}

impl TemplateBank {
    /// An empty bank with only generic templates and domains.
    pub fn new(generic_templates: Vec<String>, domains: Vec<String>) -> Self {
        Self {
            tension_templates: HashMap::new(),
            generic_templates,
            preferred_domains: HashMap::new(),
            domains,
        }
    }

    pub fn insert_templates(&mut self, tension: TensionPair, templates: Vec<String>) {
        self.tension_templates.insert(tension, templates);
    }

    pub fn insert_domains(&mut self, tension: TensionPair, domains: Vec<String>) {
        self.preferred_domains.insert(tension, domains);
    }

    /// Tension-specific templates, or the generic set when none exist.
    pub fn templates_for(&self, tension: &TensionPair) -> &[String] {
        match self.tension_templates.get(tension) {
            Some(templates) if !templates.is_empty() => templates,
            _ => &self.generic_templates,
        }
    }

    pub fn has_tension_templates(&self, tension: &TensionPair) -> bool {
        self.tension_templates
            .get(tension)
            .is_some_and(|t| !t.is_empty())
    }

    pub fn preferred_domains(&self, tension: &TensionPair) -> &[String] {
        self.preferred_domains
            .get(tension)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// Pick a domain to ground the test in.
    ///
    /// A domain named in the summary wins; then the tension's preferred
    /// domains; then any configured domain. Within a list, domains not yet
    /// used in a previous prompt come first.
    pub fn select_domain(
        &self,
        tension: &TensionPair,
        discussion_summary: &str,
        previous_prompts: &[String],
    ) -> Option<String> {
        let summary = discussion_summary.to_lowercase();
        if let Some(mentioned) = self.domains.iter().find(|d| summary.contains(d.as_str())) {
            return Some(mentioned.clone());
        }

        let preferred = self.preferred_domains(tension);
        if let Some(domain) = pick_fresh(preferred, previous_prompts) {
            return Some(domain);
        }
        pick_fresh(&self.domains, previous_prompts)
    }

    /// Pick a template not too similar to any previous prompt.
    ///
    /// Falls back to rotating through the full set when every template has
    /// been used.
    pub fn select_template(
        &self,
        tension: &TensionPair,
        previous_prompts: &[String],
    ) -> Option<&str> {
        let templates = self.templates_for(tension);
        if templates.is_empty() {
            return None;
        }

        let fresh = templates.iter().find(|template| {
            previous_prompts
                .iter()
                .all(|used| template_overlap(template, used) < SIMILARITY_THRESHOLD)
        });

        match fresh {
            Some(template) => Some(template.as_str()),
            None => Some(templates[previous_prompts.len() % templates.len()].as_str()),
        }
    }
}

fn pick_fresh(domains: &[String], previous_prompts: &[String]) -> Option<String> {
    if domains.is_empty() {
        return None;
    }
    domains
        .iter()
        .find(|d| !previous_prompts.iter().any(|p| p.to_lowercase().contains(d.as_str())))
        .or_else(|| domains.get(previous_prompts.len() % domains.len()))
        .cloned()
}

/// Fraction of a template's fixed content words present in `used`.
///
/// Placeholders are ignored, so a filled prompt fully covers its own
/// template regardless of the claim and domain it was filled with.
pub fn template_overlap(template: &str, used: &str) -> f64 {
    let skeleton = template.replace("{claim}", " ").replace("{domain}", " ");
    let template_words = content_words(&skeleton);
    if template_words.is_empty() {
        return 0.0;
    }
    let used_words: BTreeSet<String> = content_words(used);
    let shared = template_words.intersection(&used_words).count();
    shared as f64 / template_words.len() as f64
}
