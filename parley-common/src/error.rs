//! Error types for Parley.

use thiserror::Error;

/// Result type alias using the Parley error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Parley.
///
/// `Transport`, `Service` and `EmptyInput` are the failures a chat turn can
/// surface to the user. The rest come from local setup.
#[derive(Error, Debug)]
pub enum Error {
    /// Network failure or the service could not be reached
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with a well-formed error response
    #[error("Service error ({status}): {message}")]
    Service { status: u16, message: String },

    /// A turn was attempted with no user text
    #[error("Empty input: nothing to send")]
    EmptyInput,

    /// Invalid input or request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a service error from an HTTP status and response body.
    ///
    /// OpenAI-compatible APIs wrap failures as `{"error": {"message": ...}}`;
    /// when the body has that shape only the message is kept.
    pub fn service(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .map(ToString::to_string)
            })
            .unwrap_or_else(|| body.trim().to_string());

        Self::Service { status, message }
    }

    /// Check if this is a transport error.
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Check if this is a service error.
    pub const fn is_service(&self) -> bool {
        matches!(self, Self::Service { .. })
    }

    /// Check if this is an empty input error.
    pub const fn is_empty_input(&self) -> bool {
        matches!(self, Self::EmptyInput)
    }

    /// Check if the service rejected the credential.
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Service { status: 401 | 403, .. })
    }

    /// HTTP status carried by a service error, if any.
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } => Some(*status),
            _ => None,
        }
    }
}
