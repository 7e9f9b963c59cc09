// src/error.rs
use thiserror::Error;

use crate::forms::FormError;
use crate::models::auth::ServiceErrorBody;

/// Shown in the auth view when the service gives nothing more specific.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Service error ({status}): {}", .body.message)]
    Service { status: u16, body: ServiceErrorBody },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Not authenticated")]
    Unauthenticated,
    #[error(transparent)]
    InvalidForm(#[from] FormError),
    #[error("Realtime error: {0}")]
    Realtime(String),
}

impl ChatError {
    pub fn service(status: u16, body: ServiceErrorBody) -> Self {
        ChatError::Service { status, body }
    }

    /// Plain-text message for the auth view's error banner.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Service { body, .. } => body
                .first_field_message()
                .unwrap_or(GENERIC_ERROR_MESSAGE)
                .to_string(),
            ChatError::InvalidForm(form_error) => form_error.to_string(),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }
}
