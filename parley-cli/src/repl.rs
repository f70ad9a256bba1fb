//! Interactive terminal chat.
//!
//! Reads one line at a time, runs at most one request at a time, and prints
//! reply fragments as they arrive. Errors are printed in their own style and
//! never enter the transcript.

use anyhow::Result;
use console::style;
use parley_core::stt::format_from_path;
use parley_core::{ChatEngine, ChatModel, Error, Session};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Commands:
  /history         show the conversation so far
  /voice <file>    transcribe an audio file and send it
  /model [id]      show or switch the chat model
  /models          list available models
  /new             start a new session
  /help            show this help
  /quit            exit";

/// One parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    /// Text to send as a turn
    Message(String),
    /// Blank line; nothing is sent
    Empty,
    History,
    Voice(PathBuf),
    Model(Option<String>),
    Models,
    New,
    Help,
    Quit,
    /// A `/command` that does not exist or lacks its argument
    Invalid(String),
}

/// Parse one input line.
pub fn parse_line(line: &str) -> ReplInput {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return ReplInput::Empty;
    }

    let Some(command) = line.trim_start().strip_prefix('/') else {
        return ReplInput::Message(line.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, Some(rest.trim()).filter(|a| !a.is_empty())),
        None => (command, None),
    };

    match (name.to_lowercase().as_str(), arg) {
        ("history" | "h", _) => ReplInput::History,
        ("voice" | "v", Some(path)) => ReplInput::Voice(PathBuf::from(path)),
        ("voice" | "v", None) => ReplInput::Invalid("/voice needs a file path".into()),
        ("model", arg) => ReplInput::Model(arg.map(ToString::to_string)),
        ("models", _) => ReplInput::Models,
        ("new" | "reset", _) => ReplInput::New,
        ("help" | "?", _) => ReplInput::Help,
        ("quit" | "exit" | "q", _) => ReplInput::Quit,
        (other, _) => ReplInput::Invalid(format!("Unknown command /{other}")),
    }
}

/// Print an error so it cannot be mistaken for a reply.
pub fn print_error(err: &Error) {
    eprintln!("{} {err}", style("error:").red().bold());
    if err.is_auth() {
        eprintln!("{}", style("hint: check GROQ_API_KEY").dim());
    }
}

/// Format the transcript for `/history`.
pub fn history_text(session: &Session) -> String {
    if session.transcript().is_empty() {
        "(no turns yet)".to_string()
    } else {
        session.transcript().render_history()
    }
}

/// Print the list of models, marking the active one.
pub fn print_models(active: ChatModel) {
    for model in ChatModel::ALL {
        let marker = if model == active { "*" } else { " " };
        println!("{marker} {:<22} {} tokens", model.id(), model.context_window());
    }
}

/// Run one text turn, streaming the reply to stdout.
pub async fn text_turn(engine: &ChatEngine, session: &mut Session, text: &str) -> Result<(), Error> {
    print!("{} ", style("bot>").cyan().bold());
    flush();
    let result = engine
        .send(session, text, |fragment| {
            print!("{fragment}");
            flush();
        })
        .await;
    println!();
    result.map(|_| ())
}

/// Transcribe an audio file, echo what was heard, then run it as a turn.
pub async fn voice_turn(engine: &ChatEngine, session: &mut Session, path: &Path) -> Result<(), Error> {
    let audio = tokio::fs::read(path).await?;
    let heard = engine.transcribe(&audio, format_from_path(path)).await?;
    println!("{} {heard}", style("you (voice)>").green());
    text_turn(engine, session, &heard).await
}

/// Run the interactive loop until `/quit` or end of input.
pub async fn run(mut engine: ChatEngine) -> Result<()> {
    let mut session = Session::new();
    tracing::info!(session = %session.id(), model = %engine.model(), "Session started");

    println!(
        "{} model {} - type /help for commands",
        style("parley").bold(),
        style(engine.model()).yellow()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", style("you>").green().bold());
        flush();

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        match parse_line(&line) {
            ReplInput::Empty => {}
            ReplInput::Message(text) => {
                if let Err(e) = text_turn(&engine, &mut session, &text).await {
                    print_error(&e);
                }
            }
            ReplInput::Voice(path) => {
                if !engine.has_stt() {
                    print_error(&Error::Config("voice input is not configured".into()));
                } else if let Err(e) = voice_turn(&engine, &mut session, &path).await {
                    print_error(&e);
                }
            }
            ReplInput::History => println!("{}", history_text(&session)),
            ReplInput::Model(None) => println!("{}", engine.model()),
            ReplInput::Model(Some(id)) => match id.parse::<ChatModel>() {
                Ok(model) => {
                    engine.set_model(model);
                    println!("switched to {}", style(model).yellow());
                }
                Err(e) => print_error(&e),
            },
            ReplInput::Models => print_models(engine.model()),
            ReplInput::New => {
                session = Session::new();
                tracing::info!(session = %session.id(), "Session started");
                println!("{}", style("new session").dim());
            }
            ReplInput::Help => println!("{HELP}"),
            ReplInput::Quit => break,
            ReplInput::Invalid(msg) => {
                eprintln!("{} {msg}", style("error:").red().bold());
                println!("{HELP}");
            }
        }
    }

    tracing::info!(session = %session.id(), turns = session.turn_count(), "Session ended");
    Ok(())
}

fn flush() {
    let _ = std::io::stdout().flush();
}
