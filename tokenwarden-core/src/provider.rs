//! Identity provider endpoints.
//!
//! Every endpoint is derived from an authority host and a tenant:
//!
//! | Endpoint       | URL                                        |
//! |----------------|--------------------------------------------|
//! | authority      | `{host}/{tenant}`                          |
//! | authorize      | `{host}/{tenant}/oauth2/v2.0/authorize`    |
//! | token          | `{host}/{tenant}/oauth2/v2.0/token`        |
//! | device code    | `{host}/{tenant}/oauth2/v2.0/devicecode`   |
//!
//! The host is configurable so that sovereign clouds and test servers work
//! without code changes.

use serde::{Deserialize, Serialize};

use crate::model::TenantId;

/// Default Microsoft identity platform host.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Authority host from which tenant endpoints are built.
///
/// # Example
///
/// ```
/// use tokenwarden_core::provider::AuthorityHost;
///
/// let host = AuthorityHost::new("https://login.example.com/");
/// assert_eq!(host.as_str(), "https://login.example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AuthorityHost(String);

impl AuthorityHost {
    /// Create a host, trimming any trailing slashes.
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into();
        Self(host.trim_end_matches('/').to_string())
    }

    /// Get the host as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Authority URL for a tenant.
    pub fn authority(&self, tenant: &TenantId) -> String {
        format!("{}/{}", self.0, tenant)
    }

    /// Authorization endpoint for a tenant.
    pub fn authorize_url(&self, tenant: &TenantId) -> String {
        format!("{}/oauth2/v2.0/authorize", self.authority(tenant))
    }

    /// Token endpoint for a tenant.
    pub fn token_url(&self, tenant: &TenantId) -> String {
        format!("{}/oauth2/v2.0/token", self.authority(tenant))
    }

    /// Device authorization endpoint for a tenant.
    pub fn device_code_url(&self, tenant: &TenantId) -> String {
        format!("{}/oauth2/v2.0/devicecode", self.authority(tenant))
    }
}

impl From<String> for AuthorityHost {
    fn from(host: String) -> Self {
        Self::new(host)
    }
}

impl From<AuthorityHost> for String {
    fn from(host: AuthorityHost) -> Self {
        host.0
    }
}

impl Default for AuthorityHost {
    fn default() -> Self {
        Self::new(DEFAULT_AUTHORITY_HOST)
    }
}

/// Endpoints of a single authority, as used by the public client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub device_code_url: String,
}

impl AuthorityEndpoints {
    /// Derive the endpoints from an authority URL (`{host}/{tenant}`).
    pub fn from_authority(authority: &str) -> Self {
        let authority = authority.trim_end_matches('/');
        Self {
            authorize_url: format!("{}/oauth2/v2.0/authorize", authority),
            token_url: format!("{}/oauth2/v2.0/token", authority),
            device_code_url: format!("{}/oauth2/v2.0/devicecode", authority),
        }
    }
}
