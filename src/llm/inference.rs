//! Chat completions against an OpenAI-compatible API.
//!
//! The ReAct loop works on plain text, so no function-calling payloads are
//! sent: the whole rendered prompt goes out as one user message and the
//! `stop` list keeps the model from inventing its own observations.

use crate::llm::{CompletionModel, CompletionRequest};
use crate::types::*;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Inference client wrapping the chat completions endpoint.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    base_url: String,
    api_key: String,
    model: String,
    http: reqwest::Client,
}

// -- OpenAI-compatible request/response types --------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl InferenceClient {
    /// Create a new inference client. A zero timeout leaves requests unbounded.
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout_secs: u64) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(timeout_secs));
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            http: builder.build().context("Failed to build inference HTTP client")?,
        })
    }

    /// Run one chat completion and return the first choice's text.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
        max_tokens: u32,
        stop: &[String],
    ) -> Result<(String, TokenUsage)> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let request = ChatRequest {
            model: &self.model,
            messages,
            max_tokens,
            temperature,
            stop,
        };

        debug!("Inference request to model: {}", self.model);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Inference request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Inference failed ({}): {}", status, body);
        }

        let body: ChatResponse = resp.json().await.context("Failed to parse inference response")?;

        let usage = body
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok((content, usage))
    }
}

#[async_trait]
impl CompletionModel for InferenceClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let messages = [ChatMessage {
            role: ChatRole::User,
            content: request.prompt.clone(),
        }];
        let (content, usage) = self
            .chat(&messages, request.temperature, request.max_tokens, &request.stop)
            .await?;
        debug!(
            "Completion: {} prompt + {} completion tokens",
            usage.prompt_tokens, usage.completion_tokens
        );
        Ok(content)
    }
}
