//! OAuth 2.0 public and confidential client for the Microsoft identity platform.
//!
//! This module provides:
//! - [`OAuthBackend`] - The production [`AuthBackend`]
//! - [`PublicClient`] - Delegated flows over a persisted [`TokenCache`]
//! - [`TokenCache`] - Accounts, refresh tokens and access tokens of one client
//! - [`pkce`] - Authorization Code flow with PKCE over a loopback redirect
//! - [`device_code`] - Device Authorization Grant flow
//!
//! # Features
//!
//! This module is only available when the `oauth` feature is enabled.

pub mod client_credentials;
pub mod device_code;
pub mod loopback;
pub mod pkce;
pub mod public;
pub mod token_cache;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthUrl, Client, ClientId as OAuthClientId, ClientSecret, DeviceAuthorizationUrl,
    ExtraTokenFields, RequestTokenError, StandardRevocableToken, StandardTokenResponse,
    TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{AuthBackend, InteractiveOptions, PublicClientApp};
use crate::cache::CacheAccessor;
use crate::model::{ClientId, CredentialClient, InteractiveClient};
use crate::provider::AuthorityEndpoints;
use crate::store::Secret;
use crate::token::{Account, CredentialToken, TokenError};

pub use public::PublicClient;
pub use token_cache::TokenCache;

/// Scopes added to every delegated request so that the response carries an
/// id_token and a refresh token.
pub const RESERVED_SCOPES: [&str; 3] = ["openid", "profile", "offline_access"];

/// Extra token response field carrying the OpenID Connect id_token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl ExtraTokenFields for IdTokenFields {}

/// Token response of the identity platform's token endpoint.
pub type AadTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

/// `oauth2` client whose token responses keep the id_token.
pub type AadClient = Client<
    BasicErrorResponse,
    AadTokenResponse,
    BasicTokenType,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
>;

/// Create an OAuth2 client for an authority.
///
/// # Arguments
///
/// * `endpoints` - Endpoints of the tenant authority
/// * `client_id` - Application (client) id
/// * `client_secret` - Client secret for confidential clients
pub fn create_oauth_client(
    endpoints: &AuthorityEndpoints,
    client_id: &ClientId,
    client_secret: Option<&Secret>,
) -> Result<AadClient, TokenError> {
    let auth_url = AuthUrl::new(endpoints.authorize_url.clone()).map_err(|e| {
        TokenError::OAuthError {
            message: format!("invalid auth URL: {}", e),
        }
    })?;

    let token_url = TokenUrl::new(endpoints.token_url.clone()).map_err(|e| {
        TokenError::OAuthError {
            message: format!("invalid token URL: {}", e),
        }
    })?;

    let device_url =
        DeviceAuthorizationUrl::new(endpoints.device_code_url.clone()).map_err(|e| {
            TokenError::OAuthError {
                message: format!("invalid device authorization URL: {}", e),
            }
        })?;

    let client = AadClient::new(
        OAuthClientId::new(client_id.to_string()),
        client_secret.map(|s| ClientSecret::new(s.expose().to_string())),
        auth_url,
        Some(token_url),
    )
    .set_device_authorization_url(device_url);

    Ok(client)
}

/// Convert an `oauth2` request failure into a [`TokenError`].
pub(crate) fn map_request_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> TokenError
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(response) => {
            let message = match response.error_description() {
                Some(description) => format!("{}: {}", response.error(), description),
                None => response.error().to_string(),
            };
            TokenError::OAuthError { message }
        }
        RequestTokenError::Request(e) => TokenError::NetworkError {
            message: e.to_string(),
        },
        RequestTokenError::Parse(e, _) => TokenError::InvalidResponse {
            message: e.to_string(),
        },
        RequestTokenError::Other(message) => TokenError::InvalidResponse { message },
    }
}

/// A successful token endpoint response, whichever way it was obtained.
#[derive(Debug, Clone, Deserialize)]
pub struct GrantedTokens {
    pub access_token: String,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    #[serde(default, deserialize_with = "deserialize_seconds")]
    pub expires_in: Option<Duration>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default, rename = "scope", deserialize_with = "deserialize_scope")]
    pub scopes: Option<Vec<String>>,

    #[serde(default)]
    pub id_token: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

fn deserialize_seconds<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
}

fn deserialize_scope<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .map(|scope| scope.split_whitespace().map(String::from).collect()))
}

impl From<AadTokenResponse> for GrantedTokens {
    fn from(response: AadTokenResponse) -> Self {
        let token_type = match response.token_type() {
            BasicTokenType::Bearer => "Bearer".to_string(),
            BasicTokenType::Mac => "MAC".to_string(),
            BasicTokenType::Extension(other) => other.clone(),
        };

        Self {
            access_token: response.access_token().secret().clone(),
            token_type,
            expires_in: response.expires_in(),
            refresh_token: response.refresh_token().map(|t| t.secret().clone()),
            scopes: response
                .scopes()
                .map(|s| s.iter().map(|scope| scope.to_string()).collect()),
            id_token: response.extra_fields().id_token.clone(),
        }
    }
}

/// The id_token claims an [`Account`] is built from.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct IdTokenClaims {
    #[serde(default)]
    pub oid: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub tid: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl IdTokenClaims {
    /// Decode the payload of a JWT without verifying its signature.
    ///
    /// The token was just received from the token endpoint over TLS.
    pub fn decode(id_token: &str) -> Result<Self, TokenError> {
        let payload = id_token
            .split('.')
            .nth(1)
            .ok_or_else(|| TokenError::InvalidResponse {
                message: "id_token is not a JWT".to_string(),
            })?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| TokenError::InvalidResponse {
                message: format!("id_token payload is not base64url: {}", e),
            })?;

        serde_json::from_slice(&bytes).map_err(|e| TokenError::InvalidResponse {
            message: format!("id_token payload is not JSON: {}", e),
        })
    }

    /// Build the account these claims describe.
    pub fn account(&self) -> Result<Account, TokenError> {
        let object_id = self
            .oid
            .as_deref()
            .or(self.sub.as_deref())
            .ok_or_else(|| TokenError::InvalidResponse {
                message: "id_token has neither oid nor sub".to_string(),
            })?;
        let tenant_id = self.tid.clone().unwrap_or_default();

        Ok(Account {
            home_account_id: format!("{}.{}", object_id, tenant_id),
            tenant_id,
            username: self.preferred_username.clone().unwrap_or_default(),
            name: self.name.clone(),
        })
    }
}

/// Production [`AuthBackend`] talking to the identity platform over HTTPS.
#[derive(Debug, Clone)]
pub struct OAuthBackend {
    options: InteractiveOptions,
    http: reqwest::Client,
}

impl OAuthBackend {
    /// Create a backend with the given interactive settings.
    pub fn new(options: InteractiveOptions) -> Self {
        Self {
            options,
            http: reqwest::Client::new(),
        }
    }
}

impl Default for OAuthBackend {
    fn default() -> Self {
        Self::new(InteractiveOptions::default())
    }
}

#[async_trait]
impl AuthBackend for OAuthBackend {
    fn public_client(
        &self,
        client: &InteractiveClient,
        cache: Arc<dyn CacheAccessor>,
    ) -> Result<Box<dyn PublicClientApp>, TokenError> {
        let public = PublicClient::new(&client.client_id, &client.authority, cache)?
            .with_options(self.options.clone())
            .with_http(self.http.clone());
        Ok(Box::new(public))
    }

    async fn client_credentials(
        &self,
        client: &CredentialClient,
        secret: &Secret,
    ) -> Result<CredentialToken, TokenError> {
        client_credentials::acquire(client, secret).await
    }
}
