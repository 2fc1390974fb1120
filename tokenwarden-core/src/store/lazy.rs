//! Deferred, open-once secret store.

use async_trait::async_trait;
use std::sync::{Arc, OnceLock};

use super::{SecretStore, StoreError};

type Opener = Box<dyn Fn() -> Result<Arc<dyn SecretStore>, StoreError> + Send + Sync>;

/// A store that opens its backend on first use.
///
/// The opener runs at most once per `LazyStore`. Its outcome, handle or
/// failure, is remembered and every later operation reuses it, so a single
/// instance can be shared by the token cache and the secret adapter without
/// opening the keyring twice.
pub struct LazyStore {
    label: String,
    opener: Opener,
    handle: OnceLock<Result<Arc<dyn SecretStore>, String>>,
}

impl LazyStore {
    /// Create a lazy store from an opener function.
    pub fn new<F>(label: impl Into<String>, opener: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn SecretStore>, StoreError> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            opener: Box::new(opener),
            handle: OnceLock::new(),
        }
    }

    /// Lazy store over the OS keyring for `service_name`.
    #[cfg(feature = "keyring-store")]
    pub fn keyring(service_name: &str) -> Self {
        let service = service_name.to_string();
        Self::new(format!("keyring:{}", service_name), move || {
            let store = super::KeyringStore::try_new(&service)?;
            Ok(Arc::new(store) as Arc<dyn SecretStore>)
        })
    }

    /// Whether the backend has been opened (successfully or not).
    pub fn is_open(&self) -> bool {
        self.handle.get().is_some()
    }

    /// The opened backend, opening it on first call.
    pub fn handle(&self) -> Result<&Arc<dyn SecretStore>, StoreError> {
        let outcome = self.handle.get_or_init(|| {
            tracing::debug!(store = %self.label, "Opening secret store");
            (self.opener)().map_err(|e| match e {
                StoreError::KeyringUnavailable { message } => message,
                e => e.to_string(),
            })
        });

        outcome.as_ref().map_err(|message| StoreError::KeyringUnavailable {
            message: message.clone(),
        })
    }
}

impl std::fmt::Debug for LazyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyStore")
            .field("label", &self.label)
            .field("open", &self.is_open())
            .finish()
    }
}

#[async_trait]
impl SecretStore for LazyStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.handle()?.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.handle()?.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.handle()?.delete(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_store(opens: Arc<AtomicUsize>) -> LazyStore {
        LazyStore::new("memory", move || {
            opens.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(MemoryStore::new()) as Arc<dyn SecretStore>)
        })
    }

    #[tokio::test]
    async fn test_lazy_store_defers_open() {
        let opens = Arc::new(AtomicUsize::new(0));
        let store = counting_store(opens.clone());

        assert!(!store.is_open());
        assert_eq!(opens.load(Ordering::SeqCst), 0);

        store.set("k", b"v").await.unwrap();
        assert!(store.is_open());
    }

    #[tokio::test]
    async fn test_lazy_store_opens_once() {
        let opens = Arc::new(AtomicUsize::new(0));
        let store = counting_store(opens.clone());

        store.set("k", b"v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some(&b"v"[..]));
        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());

        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lazy_store_remembers_open_failure() {
        let opens = Arc::new(AtomicUsize::new(0));
        let counter = opens.clone();
        let store = LazyStore::new("broken", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::KeyringUnavailable {
                message: "no daemon".to_string(),
            })
        });

        assert!(matches!(
            store.get("k").await,
            Err(StoreError::KeyringUnavailable { .. })
        ));
        assert!(store.set("k", b"v").await.is_err());
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }
}
