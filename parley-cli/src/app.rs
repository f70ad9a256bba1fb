//! Wiring from configuration to a ready chat engine.

use anyhow::{Context, Result};
use parley_common::{Config, Validate};
use parley_core::stt;
use parley_core::{ChatEngine, ChatModel, CompatibleProvider};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Per-invocation overrides from the command line.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub no_stream: bool,
}

/// Load config from `path` (or the default location) and apply env overrides.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(p) => Config::load_from(p)?,
        None => Config::load()?,
    };
    config.apply_env_overrides();
    config
        .validate()
        .context("Invalid configuration")?;
    Ok(config)
}

/// Where `config init` writes to.
pub fn config_target(path: Option<&Path>) -> PathBuf {
    path.map_or_else(parley_common::config::config_path, Path::to_path_buf)
}

/// Resolve the chat model: command line first, then config.
pub fn resolve_model(config: &Config, opts: &ChatOptions) -> Result<ChatModel> {
    let id = opts.model.as_deref().unwrap_or(&config.completion.model);
    Ok(id.parse::<ChatModel>()?)
}

/// Build the engine. Transcription is optional; a bad STT setup only disables voice.
pub fn build_engine(config: &Config, opts: &ChatOptions) -> Result<ChatEngine> {
    let api_key = config.api_key().context(
        "No API key configured. Set GROQ_API_KEY or add secrets.api_key to the config file.",
    )?;
    let model = resolve_model(config, opts)?;

    let mut completion = config.completion.clone();
    if opts.no_stream {
        completion.stream = false;
    }
    let provider = CompatibleProvider::from_config(&completion, Some(api_key));
    tracing::debug!(
        provider = %parley_core::CompletionService::name(&provider),
        model = %model,
        mode = ?provider.mode(),
        "Completion service ready"
    );

    let mut engine = ChatEngine::new(Arc::new(provider), model);
    match stt::from_config(&config.transcription, api_key) {
        Ok(service) => engine = engine.with_stt(service),
        Err(e) => tracing::warn!(error = %e, "Voice input disabled"),
    }
    Ok(engine)
}
