//! Completion service abstraction.
//!
//! Every backend exposes its reply as a [`ReplyStream`]: a lazy, finite
//! sequence of text fragments in arrival order. A non-streaming backend
//! yields exactly one fragment holding the whole reply.

mod compatible;
mod sse;

pub use compatible::{CompatibleProvider, ReplyMode};

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use parley_common::{Error, Result};
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;

/// Reply fragments from the completion service. Consumed once.
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<String>> + Send + 'static>>;

// ============================================================================
// Models
// ============================================================================

/// Chat models accepted by the completion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChatModel {
    #[default]
    Llama3_70b,
    Llama3_8b,
    Mixtral8x7b,
    Gemma7b,
}

impl ChatModel {
    /// Every selectable model, default first.
    pub const ALL: [ChatModel; 4] = [
        Self::Llama3_70b,
        Self::Llama3_8b,
        Self::Mixtral8x7b,
        Self::Gemma7b,
    ];

    /// Model id as sent on the wire.
    pub const fn id(self) -> &'static str {
        match self {
            Self::Llama3_70b => "llama3-70b-8192",
            Self::Llama3_8b => "llama3-8b-8192",
            Self::Mixtral8x7b => "mixtral-8x7b-32768",
            Self::Gemma7b => "gemma-7b-it",
        }
    }

    /// Context window in tokens.
    pub const fn context_window(self) -> u32 {
        match self {
            Self::Llama3_70b | Self::Llama3_8b | Self::Gemma7b => 8192,
            Self::Mixtral8x7b => 32768,
        }
    }
}

impl fmt::Display for ChatModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ChatModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.id() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|m| m.id()).collect();
                Error::InvalidInput(format!(
                    "Unknown model '{s}'. Supported: {}",
                    known.join(", ")
                ))
            })
    }
}

// ============================================================================
// Request
// ============================================================================

/// One completion call: a rendered prompt and the model to run it on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: ChatModel,
    pub prompt: String,
}

impl CompletionRequest {
    pub fn new(model: ChatModel, prompt: impl Into<String>) -> Self {
        Self {
            model,
            prompt: prompt.into(),
        }
    }
}

// ============================================================================
// Service Trait
// ============================================================================

/// A hosted language-model API.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Provider name (e.g., "groq").
    fn name(&self) -> &str;

    /// Start a completion and return its fragments.
    ///
    /// Errors before the first fragment are returned here; errors after
    /// that arrive as an `Err` item in the stream.
    async fn reply(&self, request: CompletionRequest) -> Result<ReplyStream>;

    /// Run a completion to the end and return the whole reply.
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let mut stream = self.reply(request).await?;
        let mut reply = String::new();
        while let Some(fragment) = stream.next().await {
            reply.push_str(&fragment?);
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use test_case::test_case;

    struct FragmentProvider {
        fragments: Vec<&'static str>,
    }

    #[async_trait]
    impl CompletionService for FragmentProvider {
        fn name(&self) -> &str {
            "fragments"
        }

        async fn reply(&self, _request: CompletionRequest) -> Result<ReplyStream> {
            let items: Vec<Result<String>> =
                self.fragments.iter().map(|f| Ok((*f).to_string())).collect();
            Ok(Box::pin(stream::iter(items)))
        }
    }

    #[test_case("llama3-70b-8192", ChatModel::Llama3_70b ; "llama 70b")]
    #[test_case("llama3-8b-8192", ChatModel::Llama3_8b ; "llama 8b")]
    #[test_case("MIXTRAL-8x7b-32768", ChatModel::Mixtral8x7b ; "mixed case")]
    #[test_case(" gemma-7b-it ", ChatModel::Gemma7b ; "padded")]
    fn parses_known_models(id: &str, expected: ChatModel) {
        assert_eq!(id.parse::<ChatModel>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_model() {
        let err = "gpt-4".parse::<ChatModel>().unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("llama3-70b-8192"));
    }

    #[test]
    fn display_is_wire_id() {
        for model in ChatModel::ALL {
            assert_eq!(model.to_string().parse::<ChatModel>().unwrap(), model);
        }
        assert_eq!(ChatModel::default(), ChatModel::Llama3_70b);
    }

    #[tokio::test]
    async fn complete_concatenates_fragments_in_order() {
        let provider = FragmentProvider {
            fragments: vec!["Hel", "lo", "!"],
        };
        let reply = provider
            .complete(CompletionRequest::new(ChatModel::default(), "\nYou: hi\nBot:"))
            .await
            .unwrap();
        assert_eq!(reply, "Hello!");
    }

    #[test]
    fn complete_with_no_fragments_is_empty() {
        let provider = FragmentProvider { fragments: vec![] };
        let reply = tokio_test::block_on(
            provider.complete(CompletionRequest::new(ChatModel::default(), "x")),
        )
        .unwrap();
        assert!(reply.is_empty());
    }
}
