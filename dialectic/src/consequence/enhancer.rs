//! Optional prompt enhancement via an external language model.
//!
//! The generator always holds a finished fallback prompt before calling an
//! [`Enhancer`], so any failure here costs nothing but the enhancement.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::concepts::TensionPair;
use crate::config::EnhancerConfig;
use crate::error::EnhanceError;

use super::generator::TEST_PREFIX;

/// Everything an enhancer may use to rewrite a draft test prompt.
#[derive(Debug, Clone)]
pub struct EnhanceRequest<'a> {
    /// The filled fallback template.
    pub prompt: &'a str,
    pub tension: &'a TensionPair,
    pub discussion_summary: &'a str,
    pub turn_count: u64,
    pub previous_tests: &'a [String],
}

/// Rewrites a draft consequence test for better contextual fit.
#[async_trait]
pub trait Enhancer: Send + Sync {
    async fn enhance(&self, request: &EnhanceRequest<'_>) -> Result<String, EnhanceError>;
}

/// Trim model output to a single prefixed line. Empty output is an error.
pub fn normalize_enhanced(raw: &str) -> Result<String, EnhanceError> {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or(EnhanceError::EmptyResponse)?;
    let line = line.trim_matches(|c| c == '"' || c == '\'' || c == '`').trim();
    let body = line
        .strip_prefix(TEST_PREFIX)
        .or_else(|| line.strip_prefix(TEST_PREFIX.trim_end()))
        .unwrap_or(line)
        .trim();
    if body.is_empty() {
        return Err(EnhanceError::EmptyResponse);
    }
    Ok(format!("{}{}", TEST_PREFIX, body))
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

const SYSTEM_PROMPT: &str = "You sharpen consequence tests for a philosophical discussion. \
Rewrite the draft as ONE sentence that demands a concrete, falsifiable implication of the \
claim, fitted to the discussion so far and different from earlier tests. Do not answer it. \
Reply with the sentence only.";

/// [`Enhancer`] backed by an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct ChatEnhancer {
    config: EnhancerConfig,
    http: reqwest::Client,
}

impl ChatEnhancer {
    pub fn new(config: EnhancerConfig) -> Result<Self, EnhanceError> {
        if !config.is_configured() {
            return Err(EnhanceError::NotConfigured(
                "DIALECTIC_ENHANCER_URL is not set".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, http })
    }

    fn user_message(request: &EnhanceRequest<'_>) -> String {
        let mut msg = format!(
            "Tension: {} versus {}\nTurn: {}\n",
            request.tension.first(),
            request.tension.second(),
            request.turn_count
        );
        if !request.discussion_summary.trim().is_empty() {
            msg.push_str(&format!("Discussion so far: {}\n", request.discussion_summary.trim()));
        }
        if !request.previous_tests.is_empty() {
            msg.push_str("Earlier tests (avoid repeating):\n");
            for t in request.previous_tests {
                msg.push_str(&format!("- {}\n", t));
            }
        }
        msg.push_str(&format!("Draft: {}", request.prompt));
        msg
    }
}

#[async_trait]
impl Enhancer for ChatEnhancer {
    async fn enhance(&self, request: &EnhanceRequest<'_>) -> Result<String, EnhanceError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::user_message(request),
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let mut req = self.http.post(&self.config.url).json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        let response = req.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EnhanceError::Status { status, body });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(EnhanceError::EmptyResponse)?;

        normalize_enhanced(&content)
    }
}
