//! Client registry persistence.
//!
//! Registered clients are kept in `clients.toml` in the per-user
//! configuration directory (see [`config_dir`](crate::config::config_dir)),
//! one table per client name:
//!
//! ```toml
//! [demo]
//! id = "62d51730-37d6-430c-b3c5-d2bcaaf4bdb1"
//! project = "greenfield"
//! base_url = "https://greenfield.example.com/"
//! uses_secret = false
//!
//! [demo.tenant]
//! id = "d144e8ad-92a5-49c7-9e33-02e965f9679e"
//! name = "example"
//! ```
//!
//! Records are stored as written and validated when resolved. Validation
//! reports every problem in the file at once.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{ConfigError, config_dir};
use crate::model::{BaseUrl, ClientId, ClientIdentity, Tenant, TenantId};
use crate::validate::IdentityValidator;

/// File name of the client registry.
pub const REGISTRY_FILE: &str = "clients.toml";

/// Error type for client registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// One or more records are malformed; one line per problem.
    #[error("{}", violations.join("\n"))]
    Invalid { violations: Vec<String> },

    /// No client with that name is registered.
    #[error("client `{name}` was not found\npossible values:{}", format_names(available))]
    NotFound {
        name: String,
        available: Vec<String>,
    },

    /// A client with that name is already registered.
    #[error("client `{name}` already exists")]
    AlreadyExists { name: String },

    /// The registry has no clients to choose from.
    #[error("no configured clients")]
    Empty,

    /// I/O error reading or writing the registry file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The registry file is not valid TOML.
    #[error("failed to parse client registry: {0}")]
    Parse(#[from] toml::de::Error),

    /// The registry could not be serialized.
    #[error("failed to serialize client registry: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Configuration directory not available.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn format_names(names: &[String]) -> String {
    names.iter().map(|name| format!("\n  {}", name)).collect()
}

/// Tenant part of a stored client record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A client record as stored on disk, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    pub base_url: String,

    #[serde(default)]
    pub uses_secret: bool,

    pub tenant: TenantRecord,
}

impl ClientRecord {
    /// Validate this record and build the identity it describes.
    ///
    /// Collects every problem instead of stopping at the first one.
    pub fn resolve(
        &self,
        name: &str,
        validator: &IdentityValidator,
    ) -> Result<ClientIdentity, Vec<String>> {
        let mut violations = Vec::new();

        if name.is_empty() {
            violations.push("Configuration with empty name".to_string());
        }

        let id = validator.parse_uuid(&self.id);
        if id.is_none() {
            violations.push(format!(
                "Configuration for `{}` has invalid id: {}",
                name, self.id
            ));
        }

        let tenant_id = validator.parse_uuid(&self.tenant.id);
        if tenant_id.is_none() {
            violations.push(format!(
                "Configuration for `{}` has invalid tenant id: {}",
                name, self.tenant.id
            ));
        }

        if !validator.is_base_url(&self.base_url) {
            violations.push(format!(
                "Configuration for `{}` has invalid base URL: {}",
                name, self.base_url
            ));
        }

        match (id, tenant_id) {
            (Some(id), Some(tenant_id)) if violations.is_empty() => Ok(ClientIdentity {
                name: name.to_string(),
                id: ClientId::new(id),
                tenant: Tenant {
                    id: TenantId::new(tenant_id),
                    name: non_empty(self.tenant.name.as_deref()),
                },
                project: non_empty(self.project.as_deref()),
                base_url: BaseUrl::new(self.base_url.clone()),
                uses_secret: self.uses_secret,
            }),
            _ => Err(violations),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Disk-backed registry of client records, keyed by name.
#[derive(Debug)]
pub struct ClientRegistry {
    path: PathBuf,
    clients: BTreeMap<String, ClientRecord>,
    validator: IdentityValidator,
}

impl ClientRegistry {
    /// Default location of the registry file.
    pub fn default_path() -> Result<PathBuf, RegistryError> {
        Ok(config_dir()?.join(REGISTRY_FILE))
    }

    /// Open the registry at the default location.
    pub fn open(validator: IdentityValidator) -> Result<Self, RegistryError> {
        Self::open_path(Self::default_path()?, validator)
    }

    /// Open the registry stored at `path`.
    ///
    /// A missing file is an empty registry. Records are not validated here;
    /// see [`identities`](Self::identities).
    pub fn open_path(path: PathBuf, validator: IdentityValidator) -> Result<Self, RegistryError> {
        let clients = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            toml::from_str(&contents)?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            clients,
            validator,
        })
    }

    /// Open and validate the registry at `path` in one step.
    pub fn load(
        path: PathBuf,
        validator: IdentityValidator,
    ) -> Result<BTreeMap<String, ClientIdentity>, RegistryError> {
        Self::open_path(path, validator)?.identities()
    }

    /// Path of the registry file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The validator records are checked with.
    pub fn validator(&self) -> &IdentityValidator {
        &self.validator
    }

    /// Validate every record.
    ///
    /// Fails with [`RegistryError::Invalid`] listing all problems found.
    pub fn identities(&self) -> Result<BTreeMap<String, ClientIdentity>, RegistryError> {
        let mut identities = BTreeMap::new();
        let mut violations = Vec::new();

        for (name, record) in &self.clients {
            match record.resolve(name, &self.validator) {
                Ok(identity) => {
                    identities.insert(name.clone(), identity);
                }
                Err(mut problems) => violations.append(&mut problems),
            }
        }

        if violations.is_empty() {
            Ok(identities)
        } else {
            Err(RegistryError::Invalid { violations })
        }
    }

    /// Resolve a client by name.
    ///
    /// The whole registry must be valid; an unknown name lists every
    /// registered name in the error.
    pub fn resolve(&self, name: &str) -> Result<ClientIdentity, RegistryError> {
        let mut identities = self.identities()?;
        identities
            .remove(name)
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
                available: self.names(),
            })
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }

    /// Whether no clients are registered.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Whether a name is taken.
    pub fn contains(&self, name: &str) -> bool {
        self.clients.contains_key(name)
    }

    /// The stored record for a name.
    pub fn get(&self, name: &str) -> Result<&ClientRecord, RegistryError> {
        self.clients.get(name).ok_or_else(|| RegistryError::NotFound {
            name: name.to_string(),
            available: self.names(),
        })
    }

    /// Iterate over stored records.
    pub fn records(&self) -> impl Iterator<Item = (&String, &ClientRecord)> {
        self.clients.iter()
    }

    /// Add a new client. Ids are stored lowercase.
    ///
    /// Does not write to disk; call [`save`](Self::save).
    pub fn insert(&mut self, name: &str, mut record: ClientRecord) -> Result<ClientIdentity, RegistryError> {
        if self.clients.contains_key(name) {
            return Err(RegistryError::AlreadyExists {
                name: name.to_string(),
            });
        }

        record.id = record.id.to_lowercase();
        record.tenant.id = record.tenant.id.to_lowercase();

        let identity = record
            .resolve(name, &self.validator)
            .map_err(|violations| RegistryError::Invalid { violations })?;

        self.clients.insert(name.to_string(), record);
        Ok(identity)
    }

    /// Remove a client.
    ///
    /// Does not write to disk; call [`save`](Self::save).
    pub fn remove(&mut self, name: &str) -> Result<ClientRecord, RegistryError> {
        self.clients.remove(name).ok_or_else(|| RegistryError::NotFound {
            name: name.to_string(),
            available: self.names(),
        })
    }

    /// Write the registry to disk, creating the directory if needed.
    pub fn save(&self) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(&self.clients)?;
        fs::write(&self.path, contents)?;

        tracing::debug!(path = %self.path.display(), clients = self.clients.len(), "Saved client registry");
        Ok(())
    }
}
