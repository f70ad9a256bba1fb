//! Turn-taking protocol.
//!
//! A turn renders the prompt from the session transcript, drains the reply
//! stream in arrival order, and commits the turn only once the whole reply
//! has arrived. Any failure leaves the transcript exactly as it was.

use crate::conversation::render_prompt;
use crate::provider::{ChatModel, CompletionRequest, CompletionService};
use crate::session::Session;
use crate::stt::SpeechToText;
use futures_util::StreamExt;
use parley_common::{Error, Result};
use std::sync::Arc;
use tracing::Instrument;

/// Runs chat turns against a completion service.
pub struct ChatEngine {
    completion: Arc<dyn CompletionService>,
    stt: Option<Arc<dyn SpeechToText>>,
    model: ChatModel,
}

impl ChatEngine {
    pub fn new(completion: Arc<dyn CompletionService>, model: ChatModel) -> Self {
        Self {
            completion,
            stt: None,
            model,
        }
    }

    /// Enable voice turns.
    pub fn with_stt(mut self, stt: Arc<dyn SpeechToText>) -> Self {
        self.stt = Some(stt);
        self
    }

    pub fn model(&self) -> ChatModel {
        self.model
    }

    pub fn set_model(&mut self, model: ChatModel) {
        self.model = model;
    }

    pub fn has_stt(&self) -> bool {
        self.stt.is_some()
    }

    /// Run one text turn.
    ///
    /// `on_fragment` sees each reply fragment as it arrives. Returns the full
    /// reply, which has been appended to the session transcript.
    pub async fn send<F>(&self, session: &mut Session, user_text: &str, mut on_fragment: F) -> Result<String>
    where
        F: FnMut(&str) + Send,
    {
        if user_text.is_empty() {
            return Err(Error::EmptyInput);
        }

        let span = tracing::info_span!(
            "turn",
            session = %session.id(),
            turn = session.turn_count() + 1,
            model = %self.model,
            provider = %self.completion.name(),
        );

        async {
            let prompt = render_prompt(session.transcript(), user_text);
            tracing::debug!(prompt_chars = prompt.len(), "Rendered prompt");

            let mut stream = self
                .completion
                .reply(CompletionRequest::new(self.model, prompt))
                .await?;

            let mut reply = String::new();
            let mut fragments = 0usize;
            while let Some(fragment) = stream.next().await {
                let fragment = fragment.inspect_err(|e| {
                    tracing::warn!(error = %e, fragments, "Reply stream failed, turn discarded");
                })?;
                on_fragment(&fragment);
                reply.push_str(&fragment);
                fragments += 1;
            }

            session.commit_turn(user_text, &reply);
            tracing::info!(fragments, reply_chars = reply.len(), "Turn committed");
            Ok(reply)
        }
        .instrument(span)
        .await
    }

    /// Transcribe an audio buffer and run it as a text turn.
    pub async fn send_audio<F>(
        &self,
        session: &mut Session,
        audio: &[u8],
        format: &str,
        on_fragment: F,
    ) -> Result<(String, String)>
    where
        F: FnMut(&str) + Send,
    {
        let user_text = self.transcribe(audio, format).await?;
        let reply = self.send(session, &user_text, on_fragment).await?;
        Ok((user_text, reply))
    }

    /// Transcribe an audio buffer without touching any session.
    pub async fn transcribe(&self, audio: &[u8], format: &str) -> Result<String> {
        let stt = self
            .stt
            .as_ref()
            .ok_or_else(|| Error::Config("No transcription service configured".into()))?;

        let text = stt.transcribe(audio, format).await?;
        tracing::debug!(provider = %stt.provider_name(), chars = text.len(), "Audio transcribed");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ReplyStream;
    use async_trait::async_trait;
    use futures_util::stream;
    use std::sync::Mutex;

    /// Scripted completion service that records every prompt it receives.
    struct ScriptedProvider {
        replies: Mutex<Vec<Result<Vec<Result<String>>>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<Vec<Result<String>>>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn ok(fragments: &[&str]) -> Result<Vec<Result<String>>> {
            Ok(fragments.iter().map(|f| Ok((*f).to_string())).collect())
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn reply(&self, request: CompletionRequest) -> Result<ReplyStream> {
            self.prompts.lock().unwrap().push(request.prompt);
            let next = self
                .replies
                .lock()
                .unwrap()
                .pop()
                .expect("no scripted reply left");
            let items = next?;
            Ok(Box::pin(stream::iter(items)))
        }
    }

    /// Returns the fixed text, or a transport error when `None`.
    struct FixedStt(Option<String>);

    #[async_trait]
    impl SpeechToText for FixedStt {
        async fn transcribe(&self, _audio: &[u8], _format: &str) -> Result<String> {
            self.0
                .clone()
                .ok_or_else(|| Error::Transport("stt down".into()))
        }

        fn provider_name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn fragments_are_concatenated_before_commit() {
        let provider = ScriptedProvider::new(vec![ScriptedProvider::ok(&["Hel", "lo!"])]);
        let engine = ChatEngine::new(provider.clone(), ChatModel::default());
        let mut session = Session::new();

        let mut seen = Vec::new();
        let reply = engine
            .send(&mut session, "hi", |f| seen.push(f.to_string()))
            .await
            .unwrap();

        assert_eq!(reply, "Hello!");
        assert_eq!(seen, vec!["Hel", "lo!"]);
        assert_eq!(session.turn_count(), 1);
        assert_eq!(session.transcript().turns()[0].bot_text(), "Hello!");
    }

    #[tokio::test]
    async fn prompts_carry_history() {
        let provider = ScriptedProvider::new(vec![
            ScriptedProvider::ok(&["hello!"]),
            ScriptedProvider::ok(&["fine"]),
        ]);
        let engine = ChatEngine::new(provider.clone(), ChatModel::default());
        let mut session = Session::new();

        engine.send(&mut session, "hi", |_| {}).await.unwrap();
        engine.send(&mut session, "how are you", |_| {}).await.unwrap();

        assert_eq!(
            provider.prompts(),
            vec![
                "\nYou: hi\nBot:".to_string(),
                "You: hi\nBot: hello!\nYou: how are you\nBot:".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn empty_input_never_reaches_service() {
        let provider = ScriptedProvider::new(vec![]);
        let engine = ChatEngine::new(provider.clone(), ChatModel::default());
        let mut session = Session::new();

        let err = engine.send(&mut session, "", |_| {}).await.unwrap_err();
        assert!(err.is_empty_input());
        assert!(provider.prompts().is_empty());
        assert_eq!(session.turn_count(), 0);
    }

    #[tokio::test]
    async fn transport_error_leaves_transcript_unchanged() {
        let provider = ScriptedProvider::new(vec![
            ScriptedProvider::ok(&["hello!"]),
            Err(Error::Transport("connection refused".into())),
        ]);
        let engine = ChatEngine::new(provider, ChatModel::default());
        let mut session = Session::new();
        engine.send(&mut session, "hi", |_| {}).await.unwrap();
        let before = session.transcript().clone();

        let err = engine.send(&mut session, "again", |_| {}).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(session.transcript(), &before);
    }

    #[tokio::test]
    async fn mid_stream_failure_discards_partial_reply() {
        let provider = ScriptedProvider::new(vec![Ok(vec![
            Ok("partial ".to_string()),
            Err(Error::Transport("stream reset".into())),
        ])]);
        let engine = ChatEngine::new(provider, ChatModel::default());
        let mut session = Session::new();

        let mut shown = String::new();
        let err = engine
            .send(&mut session, "hi", |f| shown.push_str(f))
            .await
            .unwrap_err();

        assert!(err.is_transport());
        assert_eq!(shown, "partial ");
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn service_error_is_distinguishable() {
        let provider = ScriptedProvider::new(vec![Err(Error::service(
            401,
            r#"{"error":{"message":"Invalid API Key"}}"#,
        ))]);
        let engine = ChatEngine::new(provider, ChatModel::default());
        let mut session = Session::new();

        let err = engine.send(&mut session, "hi", |_| {}).await.unwrap_err();
        assert!(err.is_service());
        assert!(err.is_auth());
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn audio_turn_uses_transcript_as_user_text() {
        let provider = ScriptedProvider::new(vec![ScriptedProvider::ok(&["sure"])]);
        let engine = ChatEngine::new(provider.clone(), ChatModel::default())
            .with_stt(Arc::new(FixedStt(Some("play a song".into()))));
        let mut session = Session::new();

        let (heard, reply) = engine
            .send_audio(&mut session, b"RIFF....", "wav", |_| {})
            .await
            .unwrap();

        assert_eq!(heard, "play a song");
        assert_eq!(reply, "sure");
        assert_eq!(provider.prompts(), vec!["\nYou: play a song\nBot:".to_string()]);
    }

    #[tokio::test]
    async fn empty_transcription_is_empty_input() {
        let provider = ScriptedProvider::new(vec![]);
        let engine = ChatEngine::new(provider.clone(), ChatModel::default())
            .with_stt(Arc::new(FixedStt(Some(String::new()))));
        let mut session = Session::new();

        let err = engine
            .send_audio(&mut session, b"RIFF", "wav", |_| {})
            .await
            .unwrap_err();
        assert!(err.is_empty_input());
        assert!(provider.prompts().is_empty());
    }

    #[tokio::test]
    async fn failed_transcription_skips_completion() {
        let provider = ScriptedProvider::new(vec![]);
        let engine = ChatEngine::new(provider.clone(), ChatModel::default())
            .with_stt(Arc::new(FixedStt(None)));
        let mut session = Session::new();

        let err = engine
            .send_audio(&mut session, b"RIFF", "wav", |_| {})
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert!(provider.prompts().is_empty());
        assert_eq!(session.turn_count(), 0);
    }

    #[tokio::test]
    async fn audio_without_stt_is_config_error() {
        let provider = ScriptedProvider::new(vec![]);
        let engine = ChatEngine::new(provider, ChatModel::default());
        let mut session = Session::new();

        let err = engine
            .send_audio(&mut session, b"RIFF", "wav", |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
