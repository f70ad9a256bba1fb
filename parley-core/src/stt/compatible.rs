//! OpenAI-compatible STT implementation for providers like Groq, OpenAI, or a local Whisper server.

use super::traits::SpeechToText;
use async_trait::async_trait;
use parley_common::config::DEFAULT_TRANSCRIPTION_MODEL;
use parley_common::{Error, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// OpenAI-compatible `/v1/audio/transcriptions` client.
///
/// Every request asks for `response_format=json` at temperature 0.
pub struct CompatibleStt {
    name: String,
    api_key: String,
    client: Client,
    model: String,
    base_url: String,
    prompt_hint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl CompatibleStt {
    /// Create a new OpenAI-compatible STT client.
    ///
    /// # Arguments
    /// * `api_key` - API key for the provider (can be empty for local services)
    /// * `base_url` - Base URL for the API (e.g., `https://api.groq.com/openai` or `http://localhost:8000`)
    /// * `model` - Model name (default: "whisper-large-v3")
    pub fn new(api_key: String, base_url: &str, model: Option<String>) -> Self {
        Self {
            name: "compatible".to_string(),
            api_key,
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .connect_timeout(Duration::from_secs(10))
                // Some servers mishandle multipart bodies over HTTP/2
                .http1_only()
                .build()
                .unwrap_or_else(|_| Client::new()),
            model: model.unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            base_url: base_url.trim_end_matches('/').to_string(),
            prompt_hint: None,
        }
    }

    /// Set the provider name reported in logs and errors.
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Add a prompt hint that guides spelling and style.
    pub fn with_prompt_hint(mut self, hint: Option<String>) -> Self {
        self.prompt_hint = hint.filter(|h| !h.trim().is_empty());
        self
    }

    /// Replace the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .http1_only()
            .build()
            .unwrap_or_else(|_| Client::new());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[allow(clippy::match_same_arms)]
    fn get_mime_type(format: &str) -> &'static str {
        match format.to_lowercase().as_str() {
            "ogg" | "oga" => "audio/ogg",
            "mp3" => "audio/mpeg",
            "wav" => "audio/wav",
            "m4a" => "audio/m4a",
            "webm" => "audio/webm",
            "flac" => "audio/flac",
            _ => "audio/wav",
        }
    }

    fn build_form(&self, audio_bytes: &[u8], format: &str) -> Result<Form> {
        let extension = super::normalize_format(format);
        let part = Part::bytes(audio_bytes.to_vec())
            .file_name(format!("audio.{extension}"))
            .mime_str(Self::get_mime_type(extension))
            .map_err(|e| Error::InvalidInput(format!("Bad audio MIME type: {e}")))?;

        let mut form = Form::new()
            .text("model", self.model.clone())
            .text("response_format", "json")
            .text("temperature", "0.0")
            .part("file", part);
        if let Some(ref hint) = self.prompt_hint {
            form = form.text("prompt", hint.clone());
        }
        Ok(form)
    }
}

#[async_trait]
impl SpeechToText for CompatibleStt {
    async fn transcribe(&self, audio_bytes: &[u8], format: &str) -> Result<String> {
        if audio_bytes.is_empty() {
            return Err(Error::InvalidInput("Cannot transcribe empty audio data".into()));
        }

        let form = self.build_form(audio_bytes, format)?;
        let url = format!("{}/v1/audio/transcriptions", self.base_url);

        tracing::debug!(
            provider = %self.name,
            model = %self.model,
            format = %format,
            size = audio_bytes.len(),
            "Sending STT request"
        );

        // Local servers (faster-whisper-server etc.) run without auth
        let mut request = self.client.post(&url).multipart(form);
        if !self.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("STT request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(
                provider = %self.name,
                status = status.as_u16(),
                audio_size = audio_bytes.len(),
                "STT API error"
            );
            return Err(Error::service(status.as_u16(), &error_text));
        }

        let transcription: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read transcription response: {e}")))?;

        tracing::debug!(chars = transcription.text.len(), "STT transcription successful");
        Ok(transcription.text)
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}
