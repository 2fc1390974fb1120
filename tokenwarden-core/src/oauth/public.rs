//! Public (delegated) client over a persisted token cache.

use async_trait::async_trait;
use chrono::Utc;
use oauth2::reqwest::async_http_client;
use oauth2::{RefreshToken, Scope};
use std::sync::Arc;

use super::token_cache::{CachedAccessToken, TokenCache};
use super::{
    AadClient, GrantedTokens, IdTokenClaims, RESERVED_SCOPES, create_oauth_client,
    device_code, map_request_error, pkce,
};
use crate::backend::{InteractiveMode, InteractiveOptions, PublicClientApp};
use crate::cache::CacheAccessor;
use crate::model::ClientId;
use crate::provider::AuthorityEndpoints;
use crate::store::Secret;
use crate::token::{Account, AuthResult, TokenError};

/// A public client application for one client id and authority.
///
/// The cache is loaded through the [`CacheAccessor`] before every read and
/// persisted after every change, so no state survives between calls.
pub struct PublicClient {
    client_id: ClientId,
    endpoints: AuthorityEndpoints,
    oauth: AadClient,
    cache: Arc<dyn CacheAccessor>,
    options: InteractiveOptions,
    http: reqwest::Client,
}

impl PublicClient {
    /// Create a client for `authority` (`{host}/{tenant}`).
    pub fn new(
        client_id: &ClientId,
        authority: &str,
        cache: Arc<dyn CacheAccessor>,
    ) -> Result<Self, TokenError> {
        let endpoints = AuthorityEndpoints::from_authority(authority);
        let oauth = create_oauth_client(&endpoints, client_id, None)?;

        Ok(Self {
            client_id: *client_id,
            endpoints,
            oauth,
            cache,
            options: InteractiveOptions::default(),
            http: reqwest::Client::new(),
        })
    }

    /// Use different interactive settings.
    pub fn with_options(mut self, options: InteractiveOptions) -> Self {
        self.options = options;
        self
    }

    /// Share an HTTP client.
    pub fn with_http(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    async fn load_cache(&self) -> TokenCache {
        let mut cache = TokenCache::new();
        self.cache.restore(&mut cache).await;
        cache
    }

    /// Record a grant in the cache, persist it, and build the result.
    async fn record(
        &self,
        scopes: &[String],
        tokens: GrantedTokens,
        known_account: Option<&Account>,
    ) -> Result<AuthResult, TokenError> {
        let account = match (&tokens.id_token, known_account) {
            (Some(id_token), _) => IdTokenClaims::decode(id_token)?.account()?,
            (None, Some(account)) => account.clone(),
            (None, None) => {
                return Err(TokenError::InvalidResponse {
                    message: "token response has no id_token".to_string(),
                });
            }
        };

        let expires_on = Utc::now()
            + tokens
                .expires_in
                .and_then(|d| chrono::Duration::from_std(d).ok())
                .unwrap_or_else(chrono::Duration::zero);
        let access_token = Secret::new(tokens.access_token);
        let id_token = tokens.id_token.map(Secret::new);

        let mut cache = self.load_cache().await;
        cache.upsert_account(account.clone());
        if let Some(refresh_token) = tokens.refresh_token {
            cache.set_refresh_token(&account.home_account_id, Secret::new(refresh_token));
        }
        cache.insert_access_token(CachedAccessToken {
            home_account_id: account.home_account_id.clone(),
            scopes: scopes.to_vec(),
            secret: access_token.clone(),
            token_type: tokens.token_type.clone(),
            expires_on,
            id_token: id_token.clone(),
        });
        self.cache.persist(&cache).await;

        Ok(AuthResult {
            access_token,
            token_type: tokens.token_type,
            expires_on,
            scopes: tokens.scopes.unwrap_or_else(|| scopes.to_vec()),
            id_token,
            account,
            from_cache: false,
        })
    }
}

/// Requested scopes plus the reserved OpenID scopes.
pub(crate) fn with_reserved_scopes(scopes: &[String]) -> Vec<String> {
    let mut all = scopes.to_vec();
    for reserved in RESERVED_SCOPES {
        if !all.iter().any(|s| s == reserved) {
            all.push(reserved.to_string());
        }
    }
    all
}

#[async_trait]
impl PublicClientApp for PublicClient {
    async fn accounts(&self) -> Result<Vec<Account>, TokenError> {
        Ok(self.load_cache().await.accounts())
    }

    async fn acquire_token_silent(
        &self,
        scopes: &[String],
        account: &Account,
    ) -> Result<AuthResult, TokenError> {
        let cache = self.load_cache().await;

        if let Some(cached) = cache.access_token(&account.home_account_id, scopes, Utc::now()) {
            tracing::debug!(account = %account.username, "Using cached access token");
            return Ok(AuthResult {
                access_token: cached.secret.clone(),
                token_type: cached.token_type.clone(),
                expires_on: cached.expires_on,
                scopes: scopes.to_vec(),
                id_token: cached.id_token.clone(),
                account: account.clone(),
                from_cache: true,
            });
        }

        let refresh_token = cache
            .refresh_token(&account.home_account_id)
            .ok_or_else(|| TokenError::NoRefreshToken {
                account: account.username.clone(),
            })?;

        tracing::debug!(account = %account.username, "Redeeming refresh token");

        let response = self
            .oauth
            .exchange_refresh_token(&RefreshToken::new(refresh_token.expose().to_string()))
            .add_scopes(with_reserved_scopes(scopes).into_iter().map(Scope::new))
            .request_async(async_http_client)
            .await
            .map_err(map_request_error)?;

        self.record(scopes, response.into(), Some(account)).await
    }

    async fn acquire_token_interactive(&self, scopes: &[String]) -> Result<AuthResult, TokenError> {
        let requested = with_reserved_scopes(scopes);

        let tokens = match self.options.mode {
            InteractiveMode::Browser => {
                pkce::authorize(&self.oauth, &requested, &self.options).await?
            }
            InteractiveMode::DeviceCode => {
                device_code::authorize(
                    &self.oauth,
                    &self.http,
                    &self.endpoints.token_url,
                    &self.client_id,
                    &requested,
                )
                .await?
            }
        };

        self.record(scopes, tokens, None).await
    }

    async fn remove_account(&self, account: &Account) -> Result<(), TokenError> {
        let mut cache = self.load_cache().await;
        if cache.remove_account(&account.home_account_id) {
            self.cache.persist(&cache).await;
        }
        Ok(())
    }
}

impl std::fmt::Debug for PublicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicClient")
            .field("client_id", &self.client_id)
            .field("endpoints", &self.endpoints)
            .field("options", &self.options)
            .finish()
    }
}
