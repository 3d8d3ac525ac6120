// SPDX-License-Identifier: MIT

//! Typed error handling for classify-rs
//!
//! Every failure a component can surface maps onto one of these variants.
//! None of them is fatal to the process; callers turn them into a banner
//! message with [`ClassifierError::user_message`].

use crate::classification::condition::ValidationErrors;
use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, ClassifierError>;

/// Top-level error type for classify-rs
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Non-2xx answer from the backend
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Client-side validation failed, the request was never sent
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// A tree edit could not be applied
    #[error("Edit rejected: {0}")]
    Edit(String),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// No authenticated user in the session
    #[error("Authentication required")]
    Unauthenticated,

    /// Authenticated, but lacking the role the operation needs
    #[error("{0} access required")]
    Forbidden(String),

    /// Referenced record does not exist
    #[error("{kind} {id} not found")]
    NotFound { kind: String, id: i64 },

    /// HTTP transport errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

impl ClassifierError {
    /// Create an API error
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an edit error
    pub fn edit(message: impl Into<String>) -> Self {
        Self::Edit(message.into())
    }

    /// Create a not-found error
    pub fn not_found(kind: impl Into<String>, id: i64) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id,
        }
    }

    /// Whether the error was raised before anything left the client
    pub fn is_client_side(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Edit(_) | Self::Unauthenticated | Self::Forbidden(_)
        )
    }

    /// Text shown in a dismissible banner
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } if !message.is_empty() => message.clone(),
            Self::Http(e) if e.is_connect() || e.is_timeout() => {
                "Classification service is unavailable".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<ValidationErrors> for ClassifierError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<&str> for ClassifierError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for ClassifierError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}
