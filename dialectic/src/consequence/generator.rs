//! Consequence-test and synthesis prompt generation.

use tracing::{debug, warn};

use super::enhancer::{EnhanceRequest, Enhancer};
use super::templates::TemplateBank;
use crate::concepts::TensionPair;
use crate::error::{ProgressionError, ProgressionResult};
use crate::tension::ConsequenceTest;

/// Literal marker on every consequence-test prompt.
pub const TEST_PREFIX: &str = "Consequence Test: ";
/// Literal marker on every synthesis/pivot prompt.
pub const SYNTHESIS_PREFIX: &str = "Synthesis: ";

/// Claims longer than this are cut to their first sentence.
pub const MAX_CLAIM_CHARS: usize = 150;
const MAX_SUMMARY_CHARS: usize = 160;

/// Inputs for one consequence test.
#[derive(Debug, Clone)]
pub struct TestContext<'a> {
    pub tension: &'a TensionPair,
    pub claim: &'a str,
    pub discussion_summary: &'a str,
    pub turn_count: u64,
    /// Prompts already issued for this tension.
    pub previous_tests: &'a [String],
}

/// Builds consequence-test and synthesis prompts.
pub struct ConsequenceGenerator {
    bank: TemplateBank,
    /// Full configured tension list, used to choose pivot targets.
    tensions: Vec<TensionPair>,
    enhancer: Option<Box<dyn Enhancer>>,
}

impl ConsequenceGenerator {
    pub fn new(bank: TemplateBank, tensions: Vec<TensionPair>) -> Self {
        Self {
            bank,
            tensions,
            enhancer: None,
        }
    }

    pub fn with_enhancer(mut self, enhancer: Box<dyn Enhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    pub fn has_enhancer(&self) -> bool {
        self.enhancer.is_some()
    }

    /// Produce a prefixed consequence test for `ctx`.
    ///
    /// When tests were already issued for this tension and an enhancer is
    /// present, the filled template is offered to it; any enhancer failure
    /// returns the filled template unchanged.
    pub async fn generate_test(&self, ctx: &TestContext<'_>) -> ProgressionResult<String> {
        let fallback = self.fallback_test(ctx)?;

        let Some(enhancer) = &self.enhancer else {
            return Ok(fallback);
        };
        if ctx.previous_tests.is_empty() {
            return Ok(fallback);
        }

        let request = EnhanceRequest {
            prompt: &fallback,
            tension: ctx.tension,
            discussion_summary: ctx.discussion_summary,
            turn_count: ctx.turn_count,
            previous_tests: ctx.previous_tests,
        };
        match enhancer.enhance(&request).await {
            Ok(enhanced) if enhanced.starts_with(TEST_PREFIX) && enhanced.len() > TEST_PREFIX.len() => {
                debug!(tension = %ctx.tension, "consequence test enhanced");
                Ok(enhanced)
            }
            Ok(enhanced) => {
                warn!(tension = %ctx.tension, output = %enhanced, "enhancer output unusable, using template");
                Ok(fallback)
            }
            Err(e) => {
                warn!(tension = %ctx.tension, error = %e, "enhancement failed, using template");
                Ok(fallback)
            }
        }
    }

    /// Deterministic template-only test.
    pub fn fallback_test(&self, ctx: &TestContext<'_>) -> ProgressionResult<String> {
        let template = self
            .bank
            .select_template(ctx.tension, ctx.previous_tests)
            .ok_or_else(|| ProgressionError::EmptyTemplateBank(ctx.tension.key()))?;
        let domain = self
            .bank
            .select_domain(ctx.tension, ctx.discussion_summary, ctx.previous_tests)
            .unwrap_or_else(|| "everyday life".to_string());

        // Domain first: a claim may itself contain placeholder text.
        let filled = template
            .replace("{domain}", &domain)
            .replace("{claim}", &short_claim(ctx.claim));
        Ok(format!("{}{}", TEST_PREFIX, filled))
    }

    /// A pivot utterance naming both poles, a summary line, a consequence
    /// framing, and a different tension to move to.
    pub fn generate_synthesis_prompt(
        &self,
        tension: &TensionPair,
        failed_tests: &[ConsequenceTest],
        discussion_summary: &str,
    ) -> String {
        let mut out = format!(
            "{}We have circled {} versus {} without new ground",
            SYNTHESIS_PREFIX,
            tension.first(),
            tension.second()
        );
        match failed_tests.len() {
            0 => out.push('.'),
            1 => out.push_str(", and one consequence test went unanswered."),
            n => out.push_str(&format!(", and {} consequence tests went unanswered.", n)),
        }

        let summary = first_sentence(discussion_summary, MAX_SUMMARY_CHARS);
        if !summary.is_empty() {
            out.push_str(&format!(" So far: {}.", summary));
        }

        out.push_str(&format!(
            " The upshot is that neither side has named a difference the other must accept, \
             so holding {} against {} has stopped doing work.",
            tension.first(),
            tension.second()
        ));

        match self.next_tension(tension) {
            Some(next) => {
                let domain = self
                    .bank
                    .preferred_domains(&next)
                    .first()
                    .or_else(|| self.bank.domains().first())
                    .cloned()
                    .unwrap_or_else(|| "everyday life".to_string());
                out.push_str(&format!(
                    " Let us turn instead to {} versus {}: where does that tension bite in {}?",
                    next.first(),
                    next.second(),
                    domain
                ));
            }
            None => out.push_str(" Let us turn to a different question altogether."),
        }
        out
    }

    /// The configured tension after `current`, preferring ones that share no pole.
    pub fn next_tension(&self, current: &TensionPair) -> Option<TensionPair> {
        let start = self
            .tensions
            .iter()
            .position(|t| t == current)
            .map_or(0, |i| i + 1);
        let rotated = self
            .tensions
            .iter()
            .cycle()
            .skip(start)
            .take(self.tensions.len())
            .filter(|t| *t != current);

        let mut fallback = None;
        for candidate in rotated {
            if !candidate.shares_pole(current) {
                return Some(candidate.clone());
            }
            fallback.get_or_insert_with(|| candidate.clone());
        }
        fallback
    }
}

impl std::fmt::Debug for ConsequenceGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsequenceGenerator")
            .field("tensions", &self.tensions.len())
            .field("enhancer", &self.enhancer.is_some())
            .finish()
    }
}

/// Quote-safe short form of a claim.
pub fn short_claim(claim: &str) -> String {
    let collapsed = claim.split_whitespace().collect::<Vec<_>>().join(" ");
    let shortened = if collapsed.chars().count() > MAX_CLAIM_CHARS {
        first_sentence(&collapsed, MAX_CLAIM_CHARS)
    } else {
        collapsed.trim_end_matches(&['.', '!', '?'][..]).to_string()
    };
    shortened.replace('"', "'")
}

/// First sentence of `text`, cut to `max_chars` with an ellipsis if needed.
fn first_sentence(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|(i, c)| {
            matches!(c, '.' | '!' | '?')
                && text[i + c.len_utf8()..]
                    .chars()
                    .next()
                    .map_or(true, char::is_whitespace)
        })
        .map_or(text.len(), |(i, _)| i);
    let sentence = text[..end].trim();

    if sentence.chars().count() <= max_chars {
        return sentence.to_string();
    }
    let cut: String = sentence.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}
