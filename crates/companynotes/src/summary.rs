//! AI company summaries.
//!
//! Summaries come from an OpenAI-compatible chat-completions endpoint. The
//! provider sits behind [`Summarizer`] so the HTTP layer can be tested with
//! a canned implementation.

use std::fmt::Debug;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SummaryConfig;
use crate::error::{Error, Result};
use crate::model::Company;

/// System message sent with every summary request.
pub const SYSTEM_PROMPT: &str = "You write crisp, neutral company summaries.";

/// Produces a short overview of a company.
#[async_trait]
pub trait Summarizer: Send + Sync + Debug {
    /// Summarize `company`.
    async fn summarize(&self, company: &Company) -> Result<String>;
}

/// The user prompt for `company`.
#[must_use]
pub fn summary_prompt(company: &Company) -> String {
    format!(
        "Create a concise 2-3 sentence overview for {}. Description: {}. Sector: {}. Audience: product and GTM leaders.",
        company.name, company.description, company.sector
    )
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Summarizer backed by the chat-completions API.
#[derive(Clone)]
pub struct OpenAiSummarizer {
    client: Client,
    api_key: String,
    url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl Debug for OpenAiSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiSummarizer")
            .field("url", &self.url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiSummarizer {
    /// Build a summarizer from configuration. Returns `Ok(None)` without an
    /// API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &SummaryConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.clone().filter(|key| !key.is_empty()) else {
            return Ok(None);
        };

        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Some(Self {
            client,
            api_key,
            url: format!("{}/chat/completions", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }))
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, company: &Company) -> Result<String> {
        let prompt = summary_prompt(company);
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!("Requesting summary for company {}", company.id);
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::summary(format!("provider returned {status}: {body}")));
        }

        let reply: ChatResponse = response.json().await?;
        Ok(reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default())
    }
}
