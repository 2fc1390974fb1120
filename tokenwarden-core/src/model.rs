//! Domain model types for tokenwarden.
//!
//! This module defines the core types used throughout tokenwarden:
//! - [`ClientId`] / [`TenantId`] - Validated, lowercase UUID identifiers
//! - [`BaseUrl`] - Resource base URL from which the `.default` scope is built
//! - [`ClientIdentity`] - A fully resolved client registration
//! - [`CacheKey`] - Store key for a client's token cache blob
//! - [`FlowClient`] - The flow a client uses, with exactly the fields that flow needs

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::provider::AuthorityHost;

/// OAuth application (client) identifier.
///
/// Always rendered as a lowercase hyphenated UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Wrap an already validated UUID.
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Directory tenant identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Uuid);

impl TenantId {
    /// Wrap an already validated UUID.
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Resource base URL, guaranteed to end in `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaseUrl(String);

impl BaseUrl {
    /// Wrap an already validated URL.
    pub(crate) fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Get the URL as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `.default` scope for this resource.
    ///
    /// Built by plain concatenation, which is why the trailing slash is required.
    pub fn default_scope(&self) -> String {
        format!("{}.default", self.0)
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tenant a client is registered in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    /// Tenant UUID.
    pub id: TenantId,

    /// Optional human-readable tenant name.
    pub name: Option<String>,
}

/// A resolved client registration.
///
/// Loaded from the [`ClientRegistry`](crate::registry::ClientRegistry) and
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Registry name of the client.
    pub name: String,

    /// Application (client) id.
    pub id: ClientId,

    /// Tenant the client belongs to.
    pub tenant: Tenant,

    /// Optional project label.
    pub project: Option<String>,

    /// Resource base URL.
    pub base_url: BaseUrl,

    /// Whether tokens are obtained with a client secret instead of a user login.
    pub uses_secret: bool,
}

impl ClientIdentity {
    /// Store key for this client's token cache.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.tenant.id, &self.id)
    }

    /// Select the acquisition flow for this client.
    pub fn flow(&self, host: &AuthorityHost) -> FlowClient {
        let scopes = vec![self.base_url.default_scope()];

        if self.uses_secret {
            FlowClient::Credential(CredentialClient {
                client_id: self.id,
                token_url: host.token_url(&self.tenant.id),
                scopes,
            })
        } else {
            FlowClient::Interactive(InteractiveClient {
                client_id: self.id,
                authority: host.authority(&self.tenant.id),
                scopes,
            })
        }
    }
}

/// Store key of a client's token cache blob: `tenantId ++ clientId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a tenant/client pair.
    pub fn new(tenant: &TenantId, client: &ClientId) -> Self {
        Self(format!("{}{}", tenant, client))
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Acquisition flow selected for a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowClient {
    /// Delegated user login with silent reuse of the cached session.
    Interactive(InteractiveClient),

    /// Application login with a stored client secret.
    Credential(CredentialClient),
}

/// Parameters of the interactive delegated flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractiveClient {
    pub client_id: ClientId,
    /// Authority URL, `{host}/{tenant}`.
    pub authority: String,
    pub scopes: Vec<String>,
}

/// Parameters of the client-credentials flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialClient {
    pub client_id: ClientId,
    /// Tenant token endpoint.
    pub token_url: String,
    pub scopes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(uses_secret: bool) -> ClientIdentity {
        ClientIdentity {
            name: "demo".to_string(),
            id: ClientId::new(Uuid::parse_str("62d51730-37d6-430c-b3c5-d2bcaaf4bdb1").unwrap()),
            tenant: Tenant {
                id: TenantId::new(
                    Uuid::parse_str("d144e8ad-92a5-49c7-9e33-02e965f9679e").unwrap(),
                ),
                name: None,
            },
            project: None,
            base_url: BaseUrl::new("https://greenfield.example.com/"),
            uses_secret,
        }
    }

    #[test]
    fn test_cache_key_concatenates_without_delimiter() {
        let key = identity(false).cache_key();
        assert_eq!(
            key.as_str(),
            "d144e8ad-92a5-49c7-9e33-02e965f9679e62d51730-37d6-430c-b3c5-d2bcaaf4bdb1"
        );
    }

    #[test]
    fn test_default_scope() {
        let base = BaseUrl::new("https://greenfield.example.com/");
        assert_eq!(base.default_scope(), "https://greenfield.example.com/.default");
    }

    #[test]
    fn test_flow_interactive() {
        let host = AuthorityHost::default();
        match identity(false).flow(&host) {
            FlowClient::Interactive(client) => {
                assert_eq!(
                    client.authority,
                    "https://login.microsoftonline.com/d144e8ad-92a5-49c7-9e33-02e965f9679e"
                );
                assert_eq!(client.scopes, vec!["https://greenfield.example.com/.default"]);
            }
            other => panic!("expected interactive flow, got {:?}", other),
        }
    }

    #[test]
    fn test_flow_credential() {
        let host = AuthorityHost::default();
        match identity(true).flow(&host) {
            FlowClient::Credential(client) => {
                assert_eq!(
                    client.token_url,
                    "https://login.microsoftonline.com/d144e8ad-92a5-49c7-9e33-02e965f9679e/oauth2/v2.0/token"
                );
            }
            other => panic!("expected credential flow, got {:?}", other),
        }
    }
}
