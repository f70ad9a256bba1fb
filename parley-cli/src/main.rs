#![warn(clippy::all)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use parley_cli::app::{self, ChatOptions};
use parley_cli::repl;
use parley_common::logging::init_logging;
use parley_common::Config;
use parley_core::stt::{self, format_from_path};
use parley_core::Session;
use std::path::PathBuf;

/// Parley - chat with hosted language models from the terminal.
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version)]
#[command(about = "Terminal chat with hosted language models and voice input.", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.parley/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a chat session (the default)
    Chat {
        /// Model id, e.g. llama3-70b-8192
        #[arg(short, long)]
        model: Option<String>,

        /// Wait for the whole reply instead of streaming it
        #[arg(long)]
        no_stream: bool,

        /// Send one message and exit
        #[arg(short = 'M', long, conflicts_with = "audio")]
        message: Option<String>,

        /// Send one audio file as a voice turn and exit
        #[arg(short, long)]
        audio: Option<PathBuf>,
    },

    /// Transcribe an audio file and print the text
    Transcribe {
        file: PathBuf,

        /// Vocabulary hint for the transcription model
        #[arg(long)]
        prompt: Option<String>,
    },

    /// List available chat models
    Models,

    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective config with secrets masked
    Show,
    /// Print the config file location
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_file = cli.config.as_deref();

    // Config management must work even when the current file is broken
    if let Some(Commands::Config { command }) = &cli.command {
        init_logging(if cli.verbose { "debug" } else { "warn" }, "pretty");
        return match command {
            ConfigCommands::Init { force } => {
                let target = app::config_target(config_file);
                if target.exists() && !force {
                    bail!("{} already exists (use --force to overwrite)", target.display());
                }
                Config::default().save_to(&target)?;
                println!("Wrote {}", target.display());
                Ok(())
            }
            ConfigCommands::Show => {
                let config = app::load_config(config_file)?;
                println!("{}", serde_json::to_string_pretty(&config.redacted())?);
                Ok(())
            }
            ConfigCommands::Path => {
                println!("{}", app::config_target(config_file).display());
                Ok(())
            }
        };
    }

    let config = app::load_config(config_file)?;
    let level = if cli.verbose {
        "debug"
    } else {
        config.observability.log_level.as_str()
    };
    init_logging(level, &config.observability.log_format);

    match cli.command.unwrap_or(Commands::Chat {
        model: None,
        no_stream: false,
        message: None,
        audio: None,
    }) {
        Commands::Chat {
            model,
            no_stream,
            message,
            audio,
        } => {
            let engine = app::build_engine(&config, &ChatOptions { model, no_stream })?;
            let mut session = Session::new();
            let outcome = match (message, audio) {
                (Some(text), _) => repl::text_turn(&engine, &mut session, &text).await,
                (None, Some(path)) => repl::voice_turn(&engine, &mut session, &path).await,
                (None, None) => return repl::run(engine).await,
            };
            if let Err(e) = outcome {
                repl::print_error(&e);
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Transcribe { file, prompt } => {
            let api_key = config
                .api_key()
                .context("No API key configured. Set GROQ_API_KEY or add secrets.api_key to the config file.")?;
            let mut transcription = config.transcription.clone();
            if prompt.is_some() {
                transcription.prompt_hint = prompt;
            }
            let service = stt::from_config(&transcription, api_key)?;

            let audio = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            match service.transcribe(&audio, format_from_path(&file)).await {
                Ok(text) => {
                    println!("{text}");
                    Ok(())
                }
                Err(e) => {
                    repl::print_error(&e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Models => {
            let active = app::resolve_model(&config, &ChatOptions::default())?;
            repl::print_models(active);
            Ok(())
        }

        Commands::Config { .. } => unreachable!(),
    }
}
