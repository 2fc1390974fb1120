//! Seams between acquisition logic and the auth library.
//!
//! [`TokenBroker`](crate::broker::TokenBroker) only talks to these traits, so
//! tests can count interactive logins without a browser or a network.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheAccessor;
use crate::model::{CredentialClient, InteractiveClient};
use crate::store::Secret;
use crate::token::{Account, AuthResult, CredentialToken, TokenError};

/// How an interactive login is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractiveMode {
    /// Authorization code with PKCE, redirected to a loopback listener.
    #[default]
    Browser,

    /// Device authorization grant; the code is entered on any device.
    DeviceCode,
}

/// Settings for the interactive step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractiveOptions {
    pub mode: InteractiveMode,

    /// Loopback port for the browser redirect; 0 picks a free port.
    pub redirect_port: u16,

    /// Launch the system browser, or only print the URL.
    pub open_browser: bool,

    /// Maximum wait for the browser redirect.
    pub timeout: Option<Duration>,
}

impl Default for InteractiveOptions {
    fn default() -> Self {
        Self {
            mode: InteractiveMode::Browser,
            redirect_port: 0,
            open_browser: true,
            timeout: None,
        }
    }
}

/// A public (delegated) client bound to one token cache.
#[async_trait]
pub trait PublicClientApp: Send + Sync {
    /// Accounts in the cache, sorted by username.
    async fn accounts(&self) -> Result<Vec<Account>, TokenError>;

    /// Get a token for `account` without user interaction.
    async fn acquire_token_silent(
        &self,
        scopes: &[String],
        account: &Account,
    ) -> Result<AuthResult, TokenError>;

    /// Get a token by signing the user in.
    async fn acquire_token_interactive(&self, scopes: &[String]) -> Result<AuthResult, TokenError>;

    /// Forget an account and every token cached for it.
    async fn remove_account(&self, account: &Account) -> Result<(), TokenError>;
}

/// Factory for the two acquisition flows.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Build a public client whose cache is persisted through `cache`.
    fn public_client(
        &self,
        client: &InteractiveClient,
        cache: Arc<dyn CacheAccessor>,
    ) -> Result<Box<dyn PublicClientApp>, TokenError>;

    /// Run the client-credentials grant.
    async fn client_credentials(
        &self,
        client: &CredentialClient,
        secret: &Secret,
    ) -> Result<CredentialToken, TokenError>;
}
