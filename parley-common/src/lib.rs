//! Parley Common - shared configuration, errors, and logging.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - The error taxonomy surfaced to the UI layer
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::{CompletionConfig, Config, ObservabilityConfig, SecretsConfig, TranscriptionConfig};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};
