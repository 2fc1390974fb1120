//! Token types produced by acquisition.
//!
//! This module provides:
//! - [`Account`] - A signed-in user known to a client's token cache
//! - [`AuthResult`] - Result of a delegated (user) acquisition
//! - [`CredentialToken`] - Result of a client-credentials acquisition
//! - [`ProviderToken`] / [`AuthToken`] - The normalized output of either flow

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::Secret;

/// Cached access tokens closer than this to expiry are not reused.
pub const EXPIRY_BUFFER_SECS: i64 = 300;

/// Error type for token operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The account has no refresh token to redeem silently.
    #[error("no refresh token cached for account {account}")]
    NoRefreshToken { account: String },

    /// OAuth flow failed.
    #[error("OAuth flow failed: {message}")]
    OAuthError { message: String },

    /// The authorization server returned something that is not a token.
    #[error("invalid token response: {message}")]
    InvalidResponse { message: String },

    /// Network error talking to the authorization server.
    #[error("network error: {message}")]
    NetworkError { message: String },

    /// The operator denied the authorization request.
    #[error("authorization declined")]
    Declined,

    /// The interactive step did not complete in time.
    #[error("timed out waiting for {what}")]
    TimedOut { what: String },
}

/// A user account as recorded in a token cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Stable account key, `{oid}.{tid}`.
    pub home_account_id: String,

    /// Tenant the account signed in to.
    pub tenant_id: String,

    /// Sign-in name, usually an email address.
    pub username: String,

    /// Display name, when the provider supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Result of a silent or interactive user acquisition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResult {
    pub access_token: Secret,
    pub token_type: String,
    pub expires_on: DateTime<Utc>,
    pub scopes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<Secret>,

    pub account: Account,

    /// Whether the token came from the cache without a network call.
    #[serde(default)]
    pub from_cache: bool,
}

impl AuthResult {
    /// Check if the access token has expired.
    pub fn is_expired(&self) -> bool {
        self.expires_on < Utc::now()
    }
}

/// Result of a client-credentials acquisition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialToken {
    pub access_token: Secret,
    pub token_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
}

impl CredentialToken {
    /// Check if this token will expire within the given duration.
    ///
    /// Returns `false` if no expiration is known.
    pub fn expires_within(&self, duration: Duration) -> bool {
        self.expires_at
            .map(|exp| exp < Utc::now() + duration)
            .unwrap_or(false)
    }
}

/// The flow-specific result an [`AuthToken`] was built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "flow", rename_all = "snake_case")]
pub enum ProviderToken {
    Interactive(AuthResult),
    ClientCredentials(CredentialToken),
}

/// An acquired access token together with the raw provider result.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub raw: ProviderToken,
    pub access_token: Secret,
}

impl From<AuthResult> for AuthToken {
    fn from(result: AuthResult) -> Self {
        Self {
            access_token: result.access_token.clone(),
            raw: ProviderToken::Interactive(result),
        }
    }
}

impl From<CredentialToken> for AuthToken {
    fn from(token: CredentialToken) -> Self {
        Self {
            access_token: token.access_token.clone(),
            raw: ProviderToken::ClientCredentials(token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account {
            home_account_id: "oid.tid".to_string(),
            tenant_id: "tid".to_string(),
            username: "ada@example.com".to_string(),
            name: None,
        }
    }

    #[test]
    fn test_credential_token_expires_within() {
        let token = CredentialToken {
            access_token: Secret::new("t"),
            token_type: "Bearer".to_string(),
            expires_at: Some(Utc::now() + Duration::minutes(5)),
            scopes: vec![],
        };

        assert!(token.expires_within(Duration::minutes(10)));
        assert!(!token.expires_within(Duration::minutes(2)));

        let no_expiry = CredentialToken {
            expires_at: None,
            ..token
        };
        assert!(!no_expiry.expires_within(Duration::minutes(10)));
    }

    #[test]
    fn test_auth_token_from_result() {
        let result = AuthResult {
            access_token: Secret::new("eyJ0"),
            token_type: "Bearer".to_string(),
            expires_on: Utc::now() + Duration::hours(1),
            scopes: vec!["https://greenfield.example.com/.default".to_string()],
            id_token: None,
            account: account(),
            from_cache: false,
        };

        let token = AuthToken::from(result);
        assert_eq!(token.access_token.expose(), "eyJ0");
        assert!(matches!(token.raw, ProviderToken::Interactive(_)));
    }

    #[test]
    fn test_provider_token_is_tagged() {
        let raw = ProviderToken::ClientCredentials(CredentialToken {
            access_token: Secret::new("t"),
            token_type: "Bearer".to_string(),
            expires_at: None,
            scopes: vec![],
        });

        let json = serde_json::to_value(&raw).unwrap();
        assert_eq!(json["flow"], "client_credentials");
        assert_eq!(json["token_type"], "Bearer");
    }
}
