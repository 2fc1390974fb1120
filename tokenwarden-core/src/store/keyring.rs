//! OS keyring-backed secret storage.

use async_trait::async_trait;
use keyring::Entry;

use super::{SecretStore, StoreError};

/// Keyring user name opened to check the service is usable.
const CHECK_USER: &str = "__tokenwarden_check__";

/// Secret store on the platform credential service.
///
/// Each key becomes one entry filed under the store's service name, with
/// the key as the entry's user. Values are written with
/// [`Entry::set_secret`], so binary cache blobs survive unchanged:
/// - macOS: Keychain
/// - Linux: kernel keyutils backed by the Secret Service
/// - Windows: Credential Manager
///
/// ```rust,ignore
/// use tokenwarden_core::store::{KeyringStore, SecretStore};
///
/// let store = KeyringStore::try_new("tokenwarden")?;
/// store.set("client_secret_62d51730-37d6-430c-b3c5-d2bcaaf4bdb1", b"s3cr3t").await?;
/// ```
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    /// Open the keyring for `service`.
    ///
    /// Fails with [`StoreError::KeyringUnavailable`] when the platform has
    /// no usable credential service.
    pub fn try_new(service: &str) -> Result<Self, StoreError> {
        Entry::new(service, CHECK_USER).map_err(|e| StoreError::KeyringUnavailable {
            message: e.to_string(),
        })?;

        Ok(Self {
            service: service.to_string(),
        })
    }

    /// Service name every entry is filed under.
    pub fn service_name(&self) -> &str {
        &self.service
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Entry::new(&self.service, key).map_err(|e| keyring_error(key, "open", e))
    }
}

/// Translate a keyring failure on `key` during `action`.
fn keyring_error(key: &str, action: &str, err: keyring::Error) -> StoreError {
    match err {
        keyring::Error::NoStorageAccess(_) => StoreError::AccessDenied {
            key: key.to_string(),
        },
        keyring::Error::Ambiguous(entries) => StoreError::BackendError {
            message: format!("{} entries match `{}`", entries.len(), key),
        },
        other => StoreError::BackendError {
            message: format!("failed to {} keyring entry `{}`: {}", action, key, other),
        },
    }
}

impl std::fmt::Debug for KeyringStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringStore")
            .field("service", &self.service)
            .finish()
    }
}

#[async_trait]
impl SecretStore for KeyringStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self.entry(key)?.get_secret() {
            Ok(bytes) => Ok(Some(bytes)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(keyring_error(key, "read", e)),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entry(key)?
            .set_secret(value)
            .map_err(|e| keyring_error(key, "write", e))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(keyring_error(key, "delete", e)),
        }
    }
}
