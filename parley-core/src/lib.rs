//! Parley Core - conversation state and service adapters.
//!
//! - [`conversation`]: turns, transcripts and the prompt line format
//! - [`session`]: the per-user session that owns a transcript
//! - [`provider`]: completion service trait and the OpenAI-compatible client
//! - [`stt`]: transcription service trait and client
//! - [`chat`]: the turn protocol tying them together
//!
//! ## Example
//!
//! ```ignore
//! use parley_core::{ChatEngine, ChatModel, CompatibleProvider, ReplyMode, Session};
//!
//! let provider = Arc::new(CompatibleProvider::groq(Some(&api_key), ReplyMode::Streaming));
//! let engine = ChatEngine::new(provider, ChatModel::default());
//! let mut session = Session::new();
//!
//! let reply = engine.send(&mut session, "hello", |f| print!("{f}")).await?;
//! ```

#![warn(clippy::all)]

pub mod chat;
pub mod conversation;
pub mod provider;
pub mod session;
pub mod stt;

pub use chat::ChatEngine;
pub use conversation::{append_turn, render_history, render_prompt, Transcript, Turn};
pub use parley_common::{Error, Result};
pub use provider::{
    ChatModel, CompatibleProvider, CompletionRequest, CompletionService, ReplyMode, ReplyStream,
};
pub use session::Session;
pub use stt::{create_stt, CompatibleStt, SpeechToText};
