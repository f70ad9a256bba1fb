//! Configuration validation for Parley.
//!
//! Catches bad endpoints, zero timeouts and unknown logging settings before
//! any request goes out.

use thiserror::Error;

use crate::config::{CompletionConfig, Config, ObservabilityConfig, TranscriptionConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["pretty", "json"];

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Validate for Config {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        for result in [
            self.completion.validate(),
            self.transcription.validate(),
            self.observability.validate(),
        ] {
            match result {
                Ok(()) => {}
                Err(ValidationError::Multiple(inner)) => errors.extend(inner),
                Err(e) => errors.push(e),
            }
        }

        collect(errors)
    }
}

impl Validate for CompletionConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = validate_url("completion.base_url", &self.base_url) {
            errors.push(e);
        }
        if self.model.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "completion.model".into(),
            });
        }
        if self.timeout_secs == 0 {
            errors.push(positive("completion.timeout_secs"));
        }
        if self.connect_timeout_secs == 0 {
            errors.push(positive("completion.connect_timeout_secs"));
        }

        collect(errors)
    }
}

impl Validate for TranscriptionConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        match self.base_url.as_deref() {
            Some(url) => {
                if let Err(e) = validate_url("transcription.base_url", url) {
                    errors.push(e);
                }
            }
            None => {
                let provider = self.provider.to_lowercase();
                if matches!(provider.as_str(), "compatible" | "local") {
                    errors.push(ValidationError::MissingField {
                        field: "transcription.base_url".into(),
                    });
                }
            }
        }
        if self.model.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "transcription.model".into(),
            });
        }
        if self.timeout_secs == 0 {
            errors.push(positive("transcription.timeout_secs"));
        }

        collect(errors)
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            errors.push(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("'{}' is not one of {}", self.log_level, LOG_LEVELS.join(", ")),
            });
        }
        if !LOG_FORMATS.contains(&self.log_format.as_str()) {
            errors.push(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("'{}' is not one of {}", self.log_format, LOG_FORMATS.join(", ")),
            });
        }

        collect(errors)
    }
}

fn validate_url(field: &str, value: &str) -> ValidationResult<()> {
    let parsed = url::Url::parse(value).map_err(|e| ValidationError::InvalidValue {
        field: field.into(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ValidationError::InvalidValue {
            field: field.into(),
            reason: format!("unsupported scheme '{scheme}'"),
        }),
    }
}

fn positive(field: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        reason: "must be greater than zero".into(),
    }
}

fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}
