use std::{fmt::Write as _, sync::LazyLock, time::Duration};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::{config::SummarizerConfig, NormalizedItem};

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[a-zA-Z]*\s*\n(.*?)\n?\s*```\s*$").expect("code fence pattern is valid")
});

#[derive(Debug, Error)]
pub enum SummarizerError {
    #[error("summarizer request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("summarizer returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("summarizer returned no content")]
    EmptyResponse,
}

/// Turns the run's items into the digest body
pub trait Summarize {
    async fn summarize(&self, items: &[NormalizedItem]) -> Result<String, SummarizerError>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Client of an OpenAI compatible chat-completions endpoint
pub struct ChatSummarizer {
    client: reqwest::Client,
    config: SummarizerConfig,
}

impl ChatSummarizer {
    pub fn new(config: &SummarizerConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base_url.trim_end_matches('/')
        )
    }
}

impl Summarize for ChatSummarizer {
    async fn summarize(&self, items: &[NormalizedItem]) -> Result<String, SummarizerError> {
        info!(items = items.len(), model = %self.config.model, "Summarizing items");
        let prompt = build_prompt(self.config.prompt_template(), items);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut builder = self.client.post(self.endpoint()).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizerError::Status { status, body });
        }

        let response: ChatResponse = response.json().await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| unwrap_code_fence(&content))
            .filter(|content| !content.is_empty())
            .ok_or(SummarizerError::EmptyResponse)?;

        debug!(chars = content.len(), "Received digest body");
        Ok(content)
    }
}

/// Render items as the numbered block substituted for `{items}`
pub fn format_items(items: &[NormalizedItem]) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        let _ = write!(
            out,
            "[{n}] [{category}] {title}\nLink: {url}\nSource: {source}\nSummary: {summary}\n-----------------------------------\n",
            n = i + 1,
            category = item.category,
            title = item.title,
            url = item.url,
            source = item.source,
            summary = item.summary,
        );
    }
    out
}

/// Fill the prompt template's `{count}` and `{items}` placeholders
pub fn build_prompt(template: &str, items: &[NormalizedItem]) -> String {
    template
        .replace("{count}", &items.len().to_string())
        .replace("{items}", &format_items(items))
}

/// Models often wrap HTML in a Markdown fence; return the inner text
pub fn unwrap_code_fence(content: &str) -> String {
    match CODE_FENCE.captures(content) {
        Some(captures) => captures[1].trim().to_string(),
        None => content.trim().to_string(),
    }
}
