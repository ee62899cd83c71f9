//! Error types for the StackChat application.

use crate::backend::BackendError;
use thiserror::Error;

/// A shared error type for the StackChat crates.
///
/// Backend failures keep their own [`BackendError`] classification so callers
/// can still tell a disconnect from a soft repetition warning.
#[derive(Error, Debug, Clone)]
pub enum StackChatError {
    /// Configuration error (invalid value, out-of-range parameter)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON"
        message: String,
    },

    /// Session state error (turn already in flight, no model selected, ...)
    #[error("Session error: {0}")]
    Session(String),

    /// Error reported by the serving backend
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StackChatError {
    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Session error
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session(message.into())
    }

    /// Check if this is a config error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is a session error
    pub fn is_session(&self) -> bool {
        matches!(self, Self::Session(_))
    }
}

impl From<std::io::Error> for StackChatError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for StackChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for StackChatError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for StackChatError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, StackChatError>`.
pub type Result<T> = std::result::Result<T, StackChatError>;
