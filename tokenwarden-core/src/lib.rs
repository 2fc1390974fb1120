//! # tokenwarden Core
//!
//! Core library for tokenwarden, an access token broker for registered
//! OAuth clients of the Microsoft identity platform.
//!
//! This crate provides:
//! - Domain types for clients, tenants and cache keys
//! - A validated client registry and user settings
//! - Traits for secret storage and token cache persistence
//! - In-memory and (optionally) keyring-based storage implementations
//! - The [`TokenBroker`] that picks a flow and acquires a token
//! - (with `oauth`) the public/confidential client talking to the identity platform
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokenwarden_core::{ClientRegistry, IdentityValidator, TokenBroker, create_store};
//! use tokenwarden_core::oauth::OAuthBackend;
//!
//! async fn token(prompt: Arc<dyn tokenwarden_core::SecretPrompt>) -> Result<String, tokenwarden_core::WardenError> {
//!     let registry = ClientRegistry::open(IdentityValidator::new())?;
//!     let identity = registry.resolve("demo")?;
//!
//!     let broker = TokenBroker::new(
//!         OAuthBackend::default(),
//!         create_store("tokenwarden", true),
//!         prompt,
//!         Default::default(),
//!     );
//!     let acquisition = broker.acquire(&identity).await?;
//!     Ok(acquisition.token.access_token.expose().to_string())
//! }
//! ```

pub mod backend;
pub mod broker;
pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod registry;
pub mod secret;
pub mod store;
pub mod token;
pub mod validate;

#[cfg(feature = "oauth")]
pub mod oauth;

// Re-export commonly used types at crate root
pub use model::{
    BaseUrl,
    CacheKey,
    ClientId,
    ClientIdentity,
    CredentialClient,
    FlowClient,
    InteractiveClient,
    Tenant,
    TenantId,
};

pub use store::{
    LazyStore,
    MemoryStore,
    Secret,
    SecretStore,
    StoreError,
    create_store,
};

#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;

pub use cache::{
    CacheAccessor,
    CacheError,
    CacheExporter,
    CacheImporter,
    Marshaler,
    TokenCacheAdapter,
    Unmarshaler,
};

pub use token::{
    Account,
    AuthResult,
    AuthToken,
    CredentialToken,
    ProviderToken,
    TokenError,
};

pub use backend::{
    AuthBackend,
    InteractiveMode,
    InteractiveOptions,
    PublicClientApp,
};

pub use broker::{Acquisition, TokenBroker, Uncached};
pub use config::{ConfigError, Settings};
pub use error::WardenError;
pub use provider::AuthorityHost;
pub use registry::{ClientRecord, ClientRegistry, RegistryError, TenantRecord};
pub use secret::{PromptError, SecretAdapter, SecretPrompt};
pub use validate::IdentityValidator;
