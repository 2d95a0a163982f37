//! Error types for the notification pipeline.
//!
//! Validation errors reach the HTTP caller. Voice and display errors stay
//! inside the dispatcher, which logs and discards them.

use thiserror::Error;

/// Rejection reasons for a title or message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid input type")]
    InvalidType,

    #[error("Message too long (max {max} characters)")]
    TooLong { max: usize },

    #[error("Message contains no valid content after sanitization")]
    Empty,
}

/// Failures on the best-effort speech path.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Voice configuration error: {0}")]
    Config(String),

    #[error("TTS provider API key not configured")]
    ProviderAuth,

    #[error("TTS provider error: {status} - {body}")]
    ProviderRequest { status: u16, body: String },

    #[error("TTS provider unreachable: {0}")]
    ProviderUnavailable(String),

    #[error("Audio playback failed: {0}")]
    Playback(String),
}

impl VoiceError {
    /// Pipeline stage the error came from, for log context.
    pub fn stage(&self) -> &'static str {
        match self {
            VoiceError::Config(_) => "resolve",
            VoiceError::ProviderAuth
            | VoiceError::ProviderRequest { .. }
            | VoiceError::ProviderUnavailable(_) => "synthesize",
            VoiceError::Playback(_) => "playback",
        }
    }
}

#[derive(Error, Debug)]
#[error("Notification display failed: {0}")]
pub struct DisplayError(pub String);

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to read voice registry {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse voice registry: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No ```json block found in {0}")]
    MissingJsonBlock(String),
}
