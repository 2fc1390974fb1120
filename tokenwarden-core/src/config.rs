//! Configuration handling.
//!
//! Settings live in `config.toml` next to the client registry in the
//! per-user configuration directory. Every field has a default, so a missing
//! file or a partial file is fine.
//!
//! ```toml
//! authority_host = "https://login.microsoftonline.com"
//! keyring_service = "tokenwarden"
//! interactive_mode = "device_code"
//! log_level = "info"
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::backend::{InteractiveMode, InteractiveOptions};
use crate::provider::AuthorityHost;

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "TOKENWARDEN_CONFIG_DIR";

/// File name of the settings file.
pub const SETTINGS_FILE: &str = "config.toml";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No per-user configuration directory could be determined.
    #[error("configuration directory not available")]
    ConfigDirUnavailable,

    /// The settings file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid TOML for [`Settings`].
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Identity provider host every tenant authority is built from.
    pub authority_host: AuthorityHost,

    /// Keyring service name secrets and caches are filed under.
    pub keyring_service: String,

    /// How interactive logins are performed.
    pub interactive_mode: InteractiveMode,

    /// Loopback redirect port for browser logins; 0 picks a free port.
    pub redirect_port: u16,

    /// Open the system browser automatically for browser logins.
    pub open_browser: bool,

    /// Give up waiting for the browser redirect after this many seconds.
    /// Unset means wait indefinitely.
    pub interactive_timeout_secs: Option<u64>,

    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            authority_host: AuthorityHost::default(),
            keyring_service: "tokenwarden".to_string(),
            interactive_mode: InteractiveMode::default(),
            redirect_port: 0,
            open_browser: true,
            interactive_timeout_secs: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Settings {
    /// Options for the interactive login step.
    pub fn interactive_options(&self) -> InteractiveOptions {
        InteractiveOptions {
            mode: self.interactive_mode,
            redirect_port: self.redirect_port,
            open_browser: self.open_browser,
            timeout: self.interactive_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Per-user configuration directory.
///
/// `TOKENWARDEN_CONFIG_DIR` takes precedence over the platform default.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    project_dirs()
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(ConfigError::ConfigDirUnavailable)
}

/// Load settings from the default location, or defaults if there is no file.
pub fn load_settings() -> Result<Settings, ConfigError> {
    let path = config_dir()?.join(SETTINGS_FILE);
    load_settings_from(&path)
}

/// Load settings from a specific file, or defaults if it does not exist.
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No settings file, using defaults");
        return Ok(Settings::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "raibid-labs", "tokenwarden")
}
