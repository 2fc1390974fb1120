//! Client secret persistence.
//!
//! A client secret is entered once by the operator and then kept in the
//! secret store under `client_secret_{client_id}`.

use std::sync::Arc;
use thiserror::Error;

use crate::model::ClientId;
use crate::store::{Secret, SecretStore, StoreError};

/// Prefix of the store key holding a client's secret.
pub const SECRET_KEY_PREFIX: &str = "client_secret_";

/// Error type for interactive prompts.
#[derive(Debug, Error)]
pub enum PromptError {
    /// The operator aborted the prompt.
    #[error("prompt cancelled")]
    Cancelled,

    /// The prompt could not be shown or read.
    #[error("prompt failed: {message}")]
    Failed { message: String },
}

/// Asks the operator for a client secret.
pub trait SecretPrompt: Send + Sync {
    /// Read a secret with masked input.
    fn prompt_secret(&self, label: &str) -> Result<Secret, PromptError>;
}

/// Reads and writes one client's secret.
#[derive(Clone)]
pub struct SecretAdapter {
    store: Arc<dyn SecretStore>,
    key: String,
}

impl SecretAdapter {
    /// Create an adapter for a client.
    pub fn new(store: Arc<dyn SecretStore>, client_id: &ClientId) -> Self {
        Self {
            store,
            key: format!("{}{}", SECRET_KEY_PREFIX, client_id),
        }
    }

    /// Store key of the secret.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Save the secret, replacing any previous one.
    pub async fn save(&self, secret: &Secret) -> Result<(), StoreError> {
        self.store.set(&self.key, secret.expose().as_bytes()).await
    }

    /// Load the secret.
    ///
    /// Returns `Ok(None)` when nothing is stored or the stored value is empty.
    pub async fn load(&self) -> Result<Option<Secret>, StoreError> {
        let Some(bytes) = self.store.get(&self.key).await? else {
            return Ok(None);
        };

        let value = String::from_utf8(bytes).map_err(|_| StoreError::BackendError {
            message: format!("stored value at {} is not valid UTF-8", self.key),
        })?;

        if value.is_empty() {
            return Ok(None);
        }

        Ok(Some(Secret::new(value)))
    }

    /// Remove the secret. Succeeds when nothing is stored.
    pub async fn remove(&self) -> Result<(), StoreError> {
        self.store.delete(&self.key).await
    }
}

impl std::fmt::Debug for SecretAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretAdapter").field("key", &self.key).finish()
    }
}
