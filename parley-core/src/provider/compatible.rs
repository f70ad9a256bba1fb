//! OpenAI-compatible chat completions client.
//!
//! Groq, OpenAI and most hosted model APIs accept the same
//! `/v1/chat/completions` request. The whole prompt goes out as a single
//! user message.

use super::{sse, ChatModel, CompletionRequest, CompletionService, ReplyStream};
use async_trait::async_trait;
use parley_common::config::{CompletionConfig, DEFAULT_BASE_URL};
use parley_common::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// How the reply is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    /// One request, one fragment holding the whole reply
    Blocking,
    /// `stream: true`; fragments are yielded as the service sends them
    Streaming,
}

/// A provider that speaks the OpenAI-compatible chat completions API.
pub struct CompatibleProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    mode: ReplyMode,
    client: Client,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

impl CompatibleProvider {
    /// Create a provider with the default timeouts (120s request, 10s connect).
    pub fn new(name: &str, base_url: &str, api_key: Option<&str>, mode: ReplyMode) -> Self {
        Self::with_timeouts(
            name,
            base_url,
            api_key,
            mode,
            Duration::from_secs(120),
            Duration::from_secs(10),
        )
    }

    /// Create a provider with explicit timeouts.
    pub fn with_timeouts(
        name: &str,
        base_url: &str,
        api_key: Option<&str>,
        mode: ReplyMode,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()).map(ToString::to_string),
            mode,
            client: Client::builder()
                .timeout(timeout)
                .connect_timeout(connect_timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Create a Groq provider.
    pub fn groq(api_key: Option<&str>, mode: ReplyMode) -> Self {
        Self::new("groq", DEFAULT_BASE_URL, api_key, mode)
    }

    /// Create a provider from the completion config section.
    pub fn from_config(config: &CompletionConfig, api_key: Option<&str>) -> Self {
        let mode = if config.stream {
            ReplyMode::Streaming
        } else {
            ReplyMode::Blocking
        };
        let name = if config.base_url.trim_end_matches('/') == DEFAULT_BASE_URL {
            "groq"
        } else {
            "compatible"
        };
        Self::with_timeouts(
            name,
            &config.base_url,
            api_key,
            mode,
            Duration::from_secs(config.timeout_secs),
            Duration::from_secs(config.connect_timeout_secs),
        )
    }

    pub fn mode(&self) -> ReplyMode {
        self.mode
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST the request and check the status.
    async fn send(&self, model: ChatModel, prompt: &str, stream: bool) -> Result<reqwest::Response> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "{} API key not set. Set GROQ_API_KEY or secrets.api_key.",
                self.name
            ))
        })?;

        let body = WireRequest {
            model: model.id(),
            messages: vec![WireMessage {
                role: "user",
                content: prompt,
            }],
            stream,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        tracing::debug!(
            provider = %self.name,
            model = %model,
            stream,
            prompt_chars = prompt.len(),
            "Sending completion request"
        );

        let mut request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body);
        if stream {
            request = request.header("Accept", "text/event-stream");
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Request to {} failed: {e}", self.name)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(
                provider = %self.name,
                model = %model,
                status = status.as_u16(),
                "Completion API error"
            );
            return Err(Error::service(status.as_u16(), &error_text));
        }

        Ok(response)
    }

    async fn complete_once(&self, model: ChatModel, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let response = self.send(model, prompt, false).await?;

        let result: WireResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read completion response: {e}")))?;

        let choice = result
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Transport(format!("No choices in response from {}", self.name)))?;

        if let Some(usage) = result.usage {
            tracing::debug!(
                provider = %self.name,
                input_tokens = usage.prompt_tokens.unwrap_or(0),
                output_tokens = usage.completion_tokens.unwrap_or(0),
                finish_reason = choice.finish_reason.as_deref().unwrap_or("unknown"),
                latency_ms = start.elapsed().as_millis() as u64,
                "Completion finished"
            );
        }

        choice
            .message
            .content
            .ok_or_else(|| Error::Transport(format!("No content in response from {}", self.name)))
    }
}

#[async_trait]
impl CompletionService for CompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn reply(&self, request: CompletionRequest) -> Result<ReplyStream> {
        match self.mode {
            ReplyMode::Blocking => {
                let text = self.complete_once(request.model, &request.prompt).await?;
                Ok(Box::pin(futures_util::stream::once(async move { Ok(text) })))
            }
            ReplyMode::Streaming => {
                let response = self.send(request.model, &request.prompt, true).await?;
                Ok(sse::fragments(response))
            }
        }
    }
}
