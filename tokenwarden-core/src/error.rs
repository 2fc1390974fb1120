//! Top-level error types for tokenwarden.

use thiserror::Error;

use crate::config::ConfigError;
use crate::registry::RegistryError;
use crate::secret::PromptError;
use crate::store::StoreError;
use crate::token::TokenError;

/// Top-level error type encompassing all tokenwarden errors.
#[derive(Debug, Error)]
pub enum WardenError {
    /// Error from secret storage operations.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error from token acquisition.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Error from the client registry.
    #[error("{0}")]
    Registry(#[from] RegistryError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An interactive prompt failed.
    #[error("prompt failed: {message}")]
    Prompt { message: String },

    /// The operator cancelled an interactive prompt.
    #[error("cancelled")]
    Cancelled,
}

impl WardenError {
    /// Whether this is an operator cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WardenError::Cancelled)
    }
}

impl From<PromptError> for WardenError {
    fn from(err: PromptError) -> Self {
        match err {
            PromptError::Cancelled => WardenError::Cancelled,
            PromptError::Failed { message } => WardenError::Prompt { message },
        }
    }
}
