//! Speech-to-text (STT) for voice turns.
//!
//! The transcript returned here becomes the pending user text of the next
//! turn. All supported providers speak the OpenAI audio transcription API.

mod compatible;
mod traits;

pub use compatible::CompatibleStt;
pub use traits::SpeechToText;

use parley_common::config::TranscriptionConfig;
use parley_common::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai";
const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Create an STT provider based on the provider name.
///
/// # Arguments
/// * `provider` - "groq", "openai", "compatible", or "local"
/// * `api_key` - API key for the provider (may be empty for local servers)
/// * `model` - Optional model name
/// * `base_url` - Optional base URL; required for `compatible` and `local`
/// * `prompt_hint` - Optional transcription prompt
pub fn create_stt(
    provider: &str,
    api_key: &str,
    model: Option<&str>,
    base_url: Option<&str>,
    prompt_hint: Option<&str>,
) -> Result<Arc<dyn SpeechToText>> {
    Ok(Arc::new(build(provider, api_key, model, base_url, prompt_hint)?))
}

/// Create an STT provider from the transcription config section.
pub fn from_config(config: &TranscriptionConfig, api_key: &str) -> Result<Arc<dyn SpeechToText>> {
    let stt = build(
        &config.provider,
        api_key,
        Some(&config.model),
        config.base_url.as_deref(),
        config.prompt_hint.as_deref(),
    )?
    .with_timeout(Duration::from_secs(config.timeout_secs));
    Ok(Arc::new(stt))
}

fn build(
    provider: &str,
    api_key: &str,
    model: Option<&str>,
    base_url: Option<&str>,
    prompt_hint: Option<&str>,
) -> Result<CompatibleStt> {
    let name = provider.to_lowercase();
    let url = match name.as_str() {
        "groq" => base_url.unwrap_or(GROQ_BASE_URL),
        "openai" | "whisper" => base_url.unwrap_or(OPENAI_BASE_URL),
        "compatible" | "openai-compatible" | "local" | "faster-whisper" => {
            base_url.ok_or_else(|| {
                Error::Config(format!("base_url is required for '{provider}' STT provider"))
            })?
        }
        _ => {
            return Err(Error::Config(format!(
                "Unsupported STT provider: {provider}. Supported: groq, openai, compatible, local"
            )))
        }
    };

    Ok(
        CompatibleStt::new(api_key.to_string(), url, model.map(ToString::to_string))
            .named(&name)
            .with_prompt_hint(prompt_hint.map(ToString::to_string)),
    )
}

/// Canonical format name for a hint. Unknown formats are treated as WAV.
pub fn normalize_format(format: &str) -> &'static str {
    match format.trim_start_matches('.').to_lowercase().as_str() {
        "ogg" | "oga" => "ogg",
        "mp3" => "mp3",
        "m4a" | "mp4" => "m4a",
        "webm" => "webm",
        "flac" => "flac",
        _ => "wav",
    }
}

/// Format hint from a file path's extension.
pub fn format_from_path(path: &Path) -> &'static str {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or("wav", normalize_format)
}
