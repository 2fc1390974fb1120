//! Token cache persistence.
//!
//! The auth library owns the structure of its token cache; this module only
//! moves the serialized bytes in and out of a [`SecretStore`]:
//!
//! - [`Marshaler`] / [`Unmarshaler`] are implemented by the cache itself
//! - [`CacheImporter`] / [`CacheExporter`] are implemented by the storage side
//!   and called back by the library around every cache access
//! - [`TokenCacheAdapter`] is the storage side, keyed by [`CacheKey`]
//!
//! Cache persistence never fails a token acquisition: every read, decode and
//! write problem is logged, counted, and otherwise ignored.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

use crate::model::CacheKey;
use crate::store::SecretStore;

/// Error type for cache serialization.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache bytes are not valid JSON for the expected layout.
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The cache was written by an incompatible format version.
    #[error("unsupported cache format version {found}")]
    UnsupportedVersion { found: u32 },
}

/// Something that can serialize itself into an opaque blob.
pub trait Marshaler {
    fn marshal(&self) -> Result<Vec<u8>, CacheError>;
}

/// Something that can replace its state from an opaque blob.
pub trait Unmarshaler {
    fn unmarshal(&mut self, bytes: &[u8]) -> Result<(), CacheError>;
}

/// Loads persisted cache state into the library before it reads the cache.
#[async_trait]
pub trait CacheImporter: Send + Sync {
    async fn restore(&self, target: &mut (dyn Unmarshaler + Send));
}

/// Saves cache state after the library has changed it.
#[async_trait]
pub trait CacheExporter: Send + Sync {
    async fn persist(&self, source: &(dyn Marshaler + Sync));
}

/// Both directions of cache persistence.
pub trait CacheAccessor: CacheImporter + CacheExporter {}

impl<T: CacheImporter + CacheExporter> CacheAccessor for T {}

/// Stores a client's token cache blob in a [`SecretStore`] under its [`CacheKey`].
pub struct TokenCacheAdapter {
    store: Arc<dyn SecretStore>,
    key: CacheKey,
    warnings: AtomicUsize,
}

impl TokenCacheAdapter {
    /// Create an adapter for one cache key.
    pub fn new(store: Arc<dyn SecretStore>, key: CacheKey) -> Self {
        Self {
            store,
            key,
            warnings: AtomicUsize::new(0),
        }
    }

    /// The key this adapter reads and writes.
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Number of cache problems that were logged and ignored so far.
    pub fn warnings(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }

    fn degrade(&self) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for TokenCacheAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCacheAdapter")
            .field("key", &self.key)
            .field("warnings", &self.warnings())
            .finish()
    }
}

#[async_trait]
impl CacheImporter for TokenCacheAdapter {
    async fn restore(&self, target: &mut (dyn Unmarshaler + Send)) {
        let bytes = match self.store.get(self.key.as_str()).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!(key = %self.key, "No persisted token cache");
                return;
            }
            Err(e) => {
                tracing::warn!(key = %self.key, "Failed to read token cache: {}", e);
                self.degrade();
                return;
            }
        };

        if let Err(e) = target.unmarshal(&bytes) {
            tracing::warn!(key = %self.key, "Failed to unmarshal token cache: {}", e);
            self.degrade();
        }
    }
}

#[async_trait]
impl CacheExporter for TokenCacheAdapter {
    async fn persist(&self, source: &(dyn Marshaler + Sync)) {
        let bytes = match source.marshal() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key = %self.key, "Failed to marshal token cache: {}", e);
                self.degrade();
                return;
            }
        };

        match self.store.set(self.key.as_str(), &bytes).await {
            Ok(()) => tracing::debug!(key = %self.key, bytes = bytes.len(), "Persisted token cache"),
            Err(e) => {
                tracing::warn!(key = %self.key, "Failed to write token cache: {}", e);
                self.degrade();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClientId, TenantId};
    use crate::store::{MemoryStore, StoreError};
    use uuid::Uuid;

    #[derive(Default)]
    struct Blob {
        bytes: Option<Vec<u8>>,
        reject: bool,
    }

    impl Marshaler for Blob {
        fn marshal(&self) -> Result<Vec<u8>, CacheError> {
            if self.reject {
                return Err(CacheError::UnsupportedVersion { found: 0 });
            }
            Ok(self.bytes.clone().unwrap_or_default())
        }
    }

    impl Unmarshaler for Blob {
        fn unmarshal(&mut self, bytes: &[u8]) -> Result<(), CacheError> {
            if self.reject {
                return Err(CacheError::UnsupportedVersion { found: 99 });
            }
            self.bytes = Some(bytes.to_vec());
            Ok(())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl SecretStore for BrokenStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            Err(StoreError::AccessDenied { key: key.to_string() })
        }

        async fn set(&self, key: &str, _value: &[u8]) -> Result<(), StoreError> {
            Err(StoreError::AccessDenied { key: key.to_string() })
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn key() -> CacheKey {
        CacheKey::new(
            &TenantId::new(Uuid::parse_str("d144e8ad-92a5-49c7-9e33-02e965f9679e").unwrap()),
            &ClientId::new(Uuid::parse_str("62d51730-37d6-430c-b3c5-d2bcaaf4bdb1").unwrap()),
        )
    }

    #[tokio::test]
    async fn test_persist_then_restore_is_byte_identical() {
        let store: Arc<dyn SecretStore> = Arc::new(MemoryStore::new());
        let adapter = TokenCacheAdapter::new(store, key());

        let payload: Vec<u8> = (0..=255u8).collect();
        let source = Blob {
            bytes: Some(payload.clone()),
            reject: false,
        };
        adapter.persist(&source).await;

        let mut target = Blob::default();
        adapter.restore(&mut target).await;

        assert_eq!(target.bytes, Some(payload));
        assert_eq!(adapter.warnings(), 0);
    }

    #[tokio::test]
    async fn test_restore_missing_key_is_cold_start() {
        let store: Arc<dyn SecretStore> = Arc::new(MemoryStore::new());
        let adapter = TokenCacheAdapter::new(store, key());

        let mut target = Blob::default();
        adapter.restore(&mut target).await;

        assert!(target.bytes.is_none());
        assert_eq!(adapter.warnings(), 0);
    }

    #[tokio::test]
    async fn test_restore_rejected_blob_degrades() {
        let store: Arc<dyn SecretStore> = Arc::new(MemoryStore::new());
        store.set(key().as_str(), b"\x00garbage\xff").await.unwrap();
        let adapter = TokenCacheAdapter::new(store, key());

        let mut target = Blob {
            bytes: None,
            reject: true,
        };
        adapter.restore(&mut target).await;

        assert!(target.bytes.is_none());
        assert_eq!(adapter.warnings(), 1);
    }

    #[tokio::test]
    async fn test_store_failures_are_counted_not_raised() {
        let adapter = TokenCacheAdapter::new(Arc::new(BrokenStore), key());

        let mut target = Blob::default();
        adapter.restore(&mut target).await;
        adapter
            .persist(&Blob {
                bytes: Some(b"state".to_vec()),
                reject: false,
            })
            .await;

        assert_eq!(adapter.warnings(), 2);
    }

    #[tokio::test]
    async fn test_marshal_failure_keeps_previous_value() {
        let store: Arc<dyn SecretStore> = Arc::new(MemoryStore::new());
        store.set(key().as_str(), b"previous").await.unwrap();
        let adapter = TokenCacheAdapter::new(store.clone(), key());

        adapter
            .persist(&Blob {
                bytes: None,
                reject: true,
            })
            .await;

        assert_eq!(adapter.warnings(), 1);
        assert_eq!(
            store.get(key().as_str()).await.unwrap().as_deref(),
            Some(&b"previous"[..])
        );
    }
}
