//! Secret storage abstraction.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`SecretStore`] - Trait for byte-valued secret storage backends
//! - [`MemoryStore`] - In-memory implementation for testing
//! - [`KeyringStore`] - OS keyring implementation (with `keyring-store` feature)
//! - [`LazyStore`] - Opens a backend on first use, at most once
//! - [`create_store`] - Helper to select backend based on availability
//!
//! # Storage Key Convention
//!
//! The store has no notion of structure; callers own their key layout:
//! - token cache blobs live at `{tenant_id}{client_id}`
//! - client secrets live at `client_secret_{client_id}`
//!
//! # Example
//!
//! ```rust,ignore
//! use tokenwarden_core::store::{SecretStore, create_store};
//!
//! let store = create_store("tokenwarden", true);
//!
//! store.set("client_secret_62d51730-37d6-430c-b3c5-d2bcaaf4bdb1", b"s3cr3t").await?;
//! let value = store.get("client_secret_62d51730-37d6-430c-b3c5-d2bcaaf4bdb1").await?;
//! assert_eq!(value.as_deref(), Some(&b"s3cr3t"[..]));
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

mod lazy;
mod memory;
#[cfg(feature = "keyring-store")]
mod keyring;

pub use lazy::LazyStore;
pub use memory::MemoryStore;
#[cfg(feature = "keyring-store")]
pub use keyring::KeyringStore;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose) and is
/// wiped from memory when dropped.
/// Debug and Display implementations show `[REDACTED]` instead of the value.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for secret store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Access to the secret was denied.
    #[error("access denied to secret: {key}")]
    AccessDenied { key: String },

    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// The keyring backend is not available.
    #[error("keyring not available: {message}")]
    KeyringUnavailable { message: String },
}

/// Abstraction over secret storage backends.
///
/// Values are raw bytes; a missing key is `Ok(None)`, never an error.
///
/// Implementations include:
/// - [`MemoryStore`] - In-memory storage for testing
/// - [`KeyringStore`] (with `keyring-store` feature) - OS keyring
/// - [`LazyStore`] - Deferred, open-once wrapper around either
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Retrieve the value stored at a key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store a value at the given key.
    ///
    /// Overwrites any existing value.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Delete the value at a key.
    ///
    /// Returns `Ok(())` even if the key didn't exist.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Check if a key exists without keeping the value.
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }
}

#[async_trait]
impl<S: SecretStore + ?Sized> SecretStore for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        (**self).set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }
}

/// Create a secret store with automatic backend selection.
///
/// The returned store is lazy: the keyring is opened on the first operation
/// and the resulting handle is reused for the rest of the process.
///
/// # Backend Selection Logic
///
/// - If `prefer_keyring` is `true` and the `keyring-store` feature is enabled,
///   the first operation opens a [`KeyringStore`] for `service_name`. If the
///   keyring turns out to be unavailable, that operation fails with
///   [`StoreError::KeyringUnavailable`] and so does every later one.
/// - Otherwise a [`MemoryStore`] is used and nothing persists.
///
/// # Example
///
/// ```rust,ignore
/// use tokenwarden_core::store::create_store;
///
/// let store = create_store("tokenwarden", true);
/// ```
pub fn create_store(service_name: &str, prefer_keyring: bool) -> Arc<dyn SecretStore> {
    #[cfg(feature = "keyring-store")]
    if prefer_keyring {
        tracing::debug!(service = service_name, "Using OS keyring for secret storage");
        return Arc::new(LazyStore::keyring(service_name));
    }

    #[cfg(not(feature = "keyring-store"))]
    if prefer_keyring {
        tracing::warn!(
            service = service_name,
            "Keyring storage requested but keyring-store feature not enabled. \
             Using memory store. Secrets will not persist across runs."
        );
    }

    tracing::debug!("Using in-memory secret storage");
    Arc::new(MemoryStore::new())
}
