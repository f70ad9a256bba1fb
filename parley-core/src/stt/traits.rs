//! Speech-to-text trait definition.

use async_trait::async_trait;
use parley_common::Result;

/// Speech-to-text trait for transcribing audio to text.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe a complete audio buffer.
    ///
    /// # Arguments
    /// * `audio_bytes` - Raw audio data (an uploaded file or captured frames written as one buffer)
    /// * `format` - Audio format hint (e.g., "wav", "mp3", "ogg")
    async fn transcribe(&self, audio_bytes: &[u8], format: &str) -> Result<String>;

    /// Get the provider name.
    fn provider_name(&self) -> &str;
}
