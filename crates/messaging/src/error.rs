//! Error types for the messaging core.

use gigboard_database::DatabaseError;
use thiserror::Error;

/// Result type alias for messaging operations
pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] DatabaseError),
}

impl ChatError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Text safe to hand back to a client. Storage details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            Self::InvalidRequest(message) | Self::NotFound(message) | Self::Forbidden(message) => {
                message.clone()
            }
            Self::Persistence(_) => "internal error".to_string(),
        }
    }
}
