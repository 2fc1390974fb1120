//! Token acquisition orchestration.
//!
//! [`TokenBroker`] turns a [`ClientIdentity`] into an [`AuthToken`]:
//!
//! - interactive clients try the first cached account silently and fall back
//!   to exactly one interactive login
//! - secret clients load the client secret, prompting for and saving it when
//!   none is on file, then run the client-credentials grant
//!
//! Token cache problems only produce warnings; everything else is fatal.

use std::sync::Arc;

use crate::backend::{AuthBackend, PublicClientApp};
use crate::cache::{CacheAccessor, TokenCacheAdapter};
use crate::error::WardenError;
use crate::model::{ClientIdentity, CredentialClient, FlowClient, InteractiveClient};
use crate::provider::AuthorityHost;
use crate::secret::{SecretAdapter, SecretPrompt};
use crate::store::{Secret, SecretStore};
use crate::token::{Account, AuthToken};

/// A token together with the number of cache problems met on the way.
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub token: AuthToken,
    pub cache_warnings: usize,
}

/// What [`TokenBroker::uncache`] removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Uncached {
    /// The stored client secret was deleted.
    Secret,

    /// The first cached account and its tokens were dropped.
    Account(Account),

    /// Nothing was cached.
    Nothing,
}

/// Acquires tokens for registered clients.
pub struct TokenBroker<B: AuthBackend> {
    backend: B,
    store: Arc<dyn SecretStore>,
    prompt: Arc<dyn SecretPrompt>,
    host: AuthorityHost,
}

impl<B: AuthBackend> TokenBroker<B> {
    /// Create a broker.
    ///
    /// `store` is shared by the token cache and the client secrets.
    pub fn new(
        backend: B,
        store: Arc<dyn SecretStore>,
        prompt: Arc<dyn SecretPrompt>,
        host: AuthorityHost,
    ) -> Self {
        Self {
            backend,
            store,
            prompt,
            host,
        }
    }

    /// Acquire an access token for a client.
    pub async fn acquire(&self, identity: &ClientIdentity) -> Result<Acquisition, WardenError> {
        tracing::debug!(client = %identity.name, uses_secret = identity.uses_secret, "Acquiring token");

        match identity.flow(&self.host) {
            FlowClient::Interactive(client) => self.acquire_interactive(identity, &client).await,
            FlowClient::Credential(client) => {
                let token = self.acquire_with_secret(identity, &client).await?;
                Ok(Acquisition {
                    token,
                    cache_warnings: 0,
                })
            }
        }
    }

    async fn acquire_interactive(
        &self,
        identity: &ClientIdentity,
        client: &InteractiveClient,
    ) -> Result<Acquisition, WardenError> {
        let adapter = Arc::new(TokenCacheAdapter::new(
            self.store.clone(),
            identity.cache_key(),
        ));
        let app = self.public_client(client, adapter.clone())?;

        let accounts = match app.accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                tracing::warn!(client = %identity.name, "Failed to list cached accounts: {}", e);
                Vec::new()
            }
        };

        let result = match accounts.first() {
            Some(account) => match app.acquire_token_silent(&client.scopes, account).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::info!(account = %account.username, "Silent acquisition failed: {}", e);
                    app.acquire_token_interactive(&client.scopes).await?
                }
            },
            None => {
                tracing::debug!(client = %identity.name, "No cached accounts, signing in");
                app.acquire_token_interactive(&client.scopes).await?
            }
        };

        Ok(Acquisition {
            token: result.into(),
            cache_warnings: adapter.warnings(),
        })
    }

    async fn acquire_with_secret(
        &self,
        identity: &ClientIdentity,
        client: &CredentialClient,
    ) -> Result<AuthToken, WardenError> {
        let secrets = SecretAdapter::new(self.store.clone(), &identity.id);

        let secret = match secrets.load().await {
            Ok(Some(secret)) => secret,
            Ok(None) => {
                tracing::info!(client = %identity.name, "No client secret on file");
                self.prompt_and_save(identity, &secrets).await?
            }
            Err(e) => {
                tracing::warn!(client = %identity.name, "Failed to load client secret: {}", e);
                self.prompt_and_save(identity, &secrets).await?
            }
        };

        let token = self.backend.client_credentials(client, &secret).await?;
        Ok(token.into())
    }

    async fn prompt_and_save(
        &self,
        identity: &ClientIdentity,
        secrets: &SecretAdapter,
    ) -> Result<Secret, WardenError> {
        let secret = self
            .prompt
            .prompt_secret(&format!("Client secret for {}", identity.name))?;

        if let Err(e) = secrets.save(&secret).await {
            tracing::warn!(client = %identity.name, "Failed to save client secret: {}", e);
        }

        Ok(secret)
    }

    /// Store a client secret ahead of the first acquisition.
    pub async fn store_secret(
        &self,
        identity: &ClientIdentity,
        secret: &Secret,
    ) -> Result<(), WardenError> {
        SecretAdapter::new(self.store.clone(), &identity.id)
            .save(secret)
            .await?;
        Ok(())
    }

    /// Forget what is cached for a client.
    ///
    /// Secret clients lose their stored secret; interactive clients lose
    /// their first cached account.
    pub async fn uncache(&self, identity: &ClientIdentity) -> Result<Uncached, WardenError> {
        match identity.flow(&self.host) {
            FlowClient::Credential(_) => {
                let secrets = SecretAdapter::new(self.store.clone(), &identity.id);
                // Any stored value counts, even one that would not load.
                let stored = self.store.exists(secrets.key()).await?;
                secrets.remove().await?;
                Ok(if stored { Uncached::Secret } else { Uncached::Nothing })
            }
            FlowClient::Interactive(client) => {
                let adapter = Arc::new(TokenCacheAdapter::new(
                    self.store.clone(),
                    identity.cache_key(),
                ));
                let app = self.public_client(&client, adapter)?;

                match app.accounts().await?.into_iter().next() {
                    Some(account) => {
                        app.remove_account(&account).await?;
                        Ok(Uncached::Account(account))
                    }
                    None => Ok(Uncached::Nothing),
                }
            }
        }
    }

    fn public_client(
        &self,
        client: &InteractiveClient,
        cache: Arc<TokenCacheAdapter>,
    ) -> Result<Box<dyn PublicClientApp>, WardenError> {
        let cache: Arc<dyn CacheAccessor> = cache;
        Ok(self.backend.public_client(client, cache)?)
    }
}

impl<B: AuthBackend + std::fmt::Debug> std::fmt::Debug for TokenBroker<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBroker")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .finish()
    }
}
