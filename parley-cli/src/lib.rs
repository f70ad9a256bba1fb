//! Parley CLI - terminal front end for `parley-core`.

#![warn(clippy::all)]

pub mod app;
pub mod repl;

pub use app::{build_engine, load_config, ChatOptions};
