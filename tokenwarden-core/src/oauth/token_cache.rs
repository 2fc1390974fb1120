//! In-memory token cache of a public client.
//!
//! The cache is serialized as a versioned JSON document:
//!
//! ```json
//! {
//!   "version": 1,
//!   "accounts": { "<home_account_id>": { "home_account_id": "...", "username": "..." } },
//!   "refresh_tokens": { "<home_account_id>": "..." },
//!   "access_tokens": [ { "home_account_id": "...", "scopes": ["..."], "secret": "...", "expires_on": "..." } ]
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cache::{CacheError, Marshaler, Unmarshaler};
use crate::store::Secret;
use crate::token::{Account, EXPIRY_BUFFER_SECS};

/// Current serialization format version.
pub const CACHE_VERSION: u32 = 1;

/// An access token cached for one account and scope set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAccessToken {
    pub home_account_id: String,

    /// Requested scopes, sorted and without the reserved OpenID scopes.
    pub scopes: Vec<String>,

    pub secret: Secret,
    pub token_type: String,
    pub expires_on: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<Secret>,
}

impl CachedAccessToken {
    /// Whether the token is still usable, leaving the expiry buffer.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_on > now + Duration::seconds(EXPIRY_BUFFER_SECS)
    }
}

/// Token cache of a single client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenCache {
    version: u32,

    #[serde(default)]
    accounts: BTreeMap<String, Account>,

    #[serde(default)]
    refresh_tokens: BTreeMap<String, Secret>,

    #[serde(default)]
    access_tokens: Vec<CachedAccessToken>,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION,
            accounts: BTreeMap::new(),
            refresh_tokens: BTreeMap::new(),
            access_tokens: Vec::new(),
        }
    }
}

/// Normalize a scope list into a cache lookup key.
pub fn scope_key(scopes: &[String]) -> Vec<String> {
    let mut key: Vec<String> = scopes
        .iter()
        .filter(|s| !super::RESERVED_SCOPES.contains(&s.as_str()))
        .map(|s| s.to_lowercase())
        .collect();
    key.sort();
    key.dedup();
    key
}

impl TokenCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.refresh_tokens.is_empty() && self.access_tokens.is_empty()
    }

    /// Accounts, sorted by username.
    pub fn accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| {
            a.username
                .cmp(&b.username)
                .then_with(|| a.home_account_id.cmp(&b.home_account_id))
        });
        accounts
    }

    /// Add or replace an account.
    pub fn upsert_account(&mut self, account: Account) {
        self.accounts.insert(account.home_account_id.clone(), account);
    }

    /// Refresh token of an account.
    pub fn refresh_token(&self, home_account_id: &str) -> Option<&Secret> {
        self.refresh_tokens.get(home_account_id)
    }

    /// Store a refresh token, replacing the previous one.
    pub fn set_refresh_token(&mut self, home_account_id: &str, token: Secret) {
        self.refresh_tokens.insert(home_account_id.to_string(), token);
    }

    /// A fresh access token for an account and scope set.
    pub fn access_token(
        &self,
        home_account_id: &str,
        scopes: &[String],
        now: DateTime<Utc>,
    ) -> Option<&CachedAccessToken> {
        let key = scope_key(scopes);
        self.access_tokens
            .iter()
            .find(|t| t.home_account_id == home_account_id && t.scopes == key && t.is_fresh(now))
    }

    /// Store an access token, replacing any for the same account and scopes.
    pub fn insert_access_token(&mut self, mut token: CachedAccessToken) {
        token.scopes = scope_key(&token.scopes);
        self.access_tokens
            .retain(|t| !(t.home_account_id == token.home_account_id && t.scopes == token.scopes));
        self.access_tokens.push(token);
    }

    /// Drop an account and everything cached for it.
    ///
    /// Returns whether anything was removed.
    pub fn remove_account(&mut self, home_account_id: &str) -> bool {
        let before = self.access_tokens.len();
        self.access_tokens.retain(|t| t.home_account_id != home_account_id);
        let removed_tokens = self.access_tokens.len() != before;

        let removed_account = self.accounts.remove(home_account_id).is_some();
        let removed_refresh = self.refresh_tokens.remove(home_account_id).is_some();

        removed_account || removed_refresh || removed_tokens
    }
}

impl Marshaler for TokenCache {
    fn marshal(&self) -> Result<Vec<u8>, CacheError> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl Unmarshaler for TokenCache {
    fn unmarshal(&mut self, bytes: &[u8]) -> Result<(), CacheError> {
        *self = TokenCache::default();

        let decoded: TokenCache = serde_json::from_slice(bytes)?;
        if decoded.version != CACHE_VERSION {
            return Err(CacheError::UnsupportedVersion {
                found: decoded.version,
            });
        }

        *self = decoded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: &str, username: &str) -> Account {
        Account {
            home_account_id: id.to_string(),
            tenant_id: "tid".to_string(),
            username: username.to_string(),
            name: None,
        }
    }

    fn access_token(id: &str, scopes: &[&str], expires_in: Duration) -> CachedAccessToken {
        CachedAccessToken {
            home_account_id: id.to_string(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            secret: Secret::new(format!("at-{}", id)),
            token_type: "Bearer".to_string(),
            expires_on: Utc::now() + expires_in,
            id_token: None,
        }
    }

    #[test]
    fn test_accounts_sorted_by_username() {
        let mut cache = TokenCache::new();
        cache.upsert_account(account("b", "zoe@example.com"));
        cache.upsert_account(account("a", "ada@example.com"));

        let names: Vec<String> = cache.accounts().into_iter().map(|a| a.username).collect();
        assert_eq!(names, vec!["ada@example.com", "zoe@example.com"]);
    }

    #[test]
    fn test_access_token_lookup_respects_buffer() {
        let mut cache = TokenCache::new();
        cache.insert_access_token(access_token("a", &["https://x/.default"], Duration::hours(1)));
        cache.insert_access_token(access_token("b", &["https://x/.default"], Duration::minutes(4)));

        let scopes = vec!["https://x/.default".to_string(), "openid".to_string()];
        assert!(cache.access_token("a", &scopes, Utc::now()).is_some());
        assert!(cache.access_token("b", &scopes, Utc::now()).is_none());
        assert!(cache.access_token("a", &["https://y/.default".to_string()], Utc::now()).is_none());
    }

    #[test]
    fn test_insert_replaces_same_scope_set() {
        let mut cache = TokenCache::new();
        cache.insert_access_token(access_token("a", &["s2", "s1"], Duration::hours(1)));
        cache.insert_access_token(access_token("a", &["s1", "s2"], Duration::hours(2)));

        assert_eq!(cache.access_tokens.len(), 1);
        assert_eq!(cache.access_tokens[0].scopes, vec!["s1", "s2"]);
    }

    #[test]
    fn test_remove_account_drops_tokens() {
        let mut cache = TokenCache::new();
        cache.upsert_account(account("a", "ada@example.com"));
        cache.set_refresh_token("a", Secret::new("rt"));
        cache.insert_access_token(access_token("a", &["s"], Duration::hours(1)));

        assert!(cache.remove_account("a"));
        assert!(cache.is_empty());
        assert!(!cache.remove_account("a"));
    }

    #[test]
    fn test_marshal_unmarshal() {
        let mut cache = TokenCache::new();
        cache.upsert_account(account("a", "ada@example.com"));
        cache.set_refresh_token("a", Secret::new("rt"));

        let bytes = cache.marshal().unwrap();
        let mut restored = TokenCache::new();
        restored.unmarshal(&bytes).unwrap();

        assert_eq!(restored, cache);
        assert_eq!(restored.refresh_token("a").unwrap().expose(), "rt");
    }

    #[test]
    fn test_unmarshal_garbage_leaves_cache_empty() {
        let mut cache = TokenCache::new();
        cache.upsert_account(account("a", "ada@example.com"));

        assert!(cache.unmarshal(b"{not json").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unmarshal_rejects_other_versions() {
        let mut cache = TokenCache::new();
        let err = cache.unmarshal(br#"{"version": 7}"#).unwrap_err();
        assert!(matches!(err, CacheError::UnsupportedVersion { found: 7 }));
    }
}
