//! # Agent Configuration
//!
//! ## Configuration Sources
//! ```text
//! 1. Environment variables (highest priority)
//!    CLOCKIN_SERVER_URL, CLOCKIN_PROBE_URL,
//!    CLOCKIN_AUTO_SYNC, CLOCKIN_DATABASE_PATH
//!
//! 2. TOML config file
//!    explicit --config path, or
//!    ~/.config/clockin/clockin.toml (Linux)
//!    ~/Library/Application Support/com.clockin.clockin/clockin.toml (macOS)
//!
//! 3. Default values (lowest priority)
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [server]
//! url = "http://localhost:3001/api/rfid/scan"
//! # probe_url = "http://localhost:3001/api/rfid/check/test"
//! request_timeout_secs = 5
//!
//! [card]
//! prefix = "000"
//! remove_prefix = false
//!
//! [sync]
//! auto_sync = true
//! check_interval_secs = 10
//! sync_interval_secs = 60
//! pause_ms = 500
//!
//! [storage]
//! database_path = "clockin.db"
//! ```
//!
//! The configuration is loaded once at startup. Only `auto_sync` can change
//! at runtime, through the agent handle.

use clockin_core::CardPolicy;
use clockin_core::constants::{
    DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_DATABASE_PATH, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SERVER_URL, DEFAULT_SYNC_INTERVAL_SECS, DEFAULT_SYNC_PAUSE_MS,
};
use clockin_network::AuthorityClientConfig;
use clockin_storage::DatabaseConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{AgentError, AgentResult};

pub const ENV_SERVER_URL: &str = "CLOCKIN_SERVER_URL";
pub const ENV_PROBE_URL: &str = "CLOCKIN_PROBE_URL";
pub const ENV_AUTO_SYNC: &str = "CLOCKIN_AUTO_SYNC";
pub const ENV_DATABASE_PATH: &str = "CLOCKIN_DATABASE_PATH";

// =============================================================================
// Sections
// =============================================================================

/// `[server]`: the attendance server endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Scan submission endpoint.
    #[serde(default = "default_server_url")]
    pub url: String,

    /// Reachability endpoint. Derived from `url` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_url: Option<String>,

    /// Bound on each HTTP request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// `[sync]`: connectivity checks and offline queue draining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Drain the queue automatically when the server is reachable.
    #[serde(default = "default_true")]
    pub auto_sync: bool,

    /// Interval between reachability probes.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Minimum spacing between two automatic sync passes.
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,

    /// Pause between two submissions of one pass.
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
}

/// `[storage]`: the offline queue database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}
fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
fn default_true() -> bool {
    true
}
fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}
fn default_sync_interval() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}
fn default_pause_ms() -> u64 {
    DEFAULT_SYNC_PAUSE_MS
}
fn default_database_path() -> String {
    DEFAULT_DATABASE_PATH.to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            url: default_server_url(),
            probe_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            auto_sync: default_true(),
            check_interval_secs: default_check_interval(),
            sync_interval_secs: default_sync_interval(),
            pause_ms: default_pause_ms(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            database_path: default_database_path(),
        }
    }
}

// =============================================================================
// Runtime Settings
// =============================================================================

/// Timing and policy values the running agent needs, already converted to
/// their runtime types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub card_policy: CardPolicy,
    pub auto_sync: bool,
    pub check_interval: Duration,
    pub sync_interval: Duration,
    pub sync_pause: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        AgentConfig::default().runtime()
    }
}

// =============================================================================
// Agent Configuration
// =============================================================================

/// Complete agent configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub card: CardPolicy,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl AgentConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config_path`, or the platform config directory)
    /// 3. Environment variables
    ///
    /// A missing file is not an error; an unreadable or malformed one is.
    pub fn load(config_path: Option<PathBuf>) -> AgentResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML document. Missing sections and keys take their defaults.
    pub fn from_toml_str(contents: &str) -> AgentResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> AgentResult<()> {
        self.server_url()?;
        self.probe_url()?;

        if self.server.request_timeout_secs == 0 {
            return Err(AgentError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.sync.check_interval_secs == 0 {
            return Err(AgentError::InvalidConfig(
                "check_interval_secs must be greater than 0".into(),
            ));
        }

        if self.sync.sync_interval_secs == 0 {
            return Err(AgentError::InvalidConfig(
                "sync_interval_secs must be greater than 0".into(),
            ));
        }

        if self.storage.database_path.trim().is_empty() {
            return Err(AgentError::InvalidConfig(
                "database_path must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides read through `lookup` (environment in production).
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_SERVER_URL) {
            debug!(url = %url, "Overriding server URL from environment");
            self.server.url = url;
        }

        if let Some(url) = lookup(ENV_PROBE_URL) {
            debug!(url = %url, "Overriding probe URL from environment");
            self.server.probe_url = Some(url);
        }

        if let Some(value) = lookup(ENV_AUTO_SYNC) {
            match parse_flag(&value) {
                Some(enabled) => {
                    debug!(enabled, "Overriding auto-sync from environment");
                    self.sync.auto_sync = enabled;
                }
                None => warn!(value = %value, "Ignoring unrecognized {}", ENV_AUTO_SYNC),
            }
        }

        if let Some(path) = lookup(ENV_DATABASE_PATH) {
            debug!(path = %path, "Overriding database path from environment");
            self.storage.database_path = path;
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "clockin", "clockin")
            .map(|dirs| dirs.config_dir().join("clockin.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Parsed submission endpoint.
    pub fn server_url(&self) -> AgentResult<Url> {
        parse_http_url("server url", &self.server.url)
    }

    /// Parsed explicit probe endpoint, if configured.
    pub fn probe_url(&self) -> AgentResult<Option<Url>> {
        self.server
            .probe_url
            .as_deref()
            .map(|url| parse_http_url("probe url", url))
            .transpose()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Client configuration for the attendance server.
    pub fn authority_config(&self) -> AgentResult<AuthorityClientConfig> {
        let mut config =
            AuthorityClientConfig::new(self.server_url()?).timeout(self.request_timeout());
        if let Some(probe_url) = self.probe_url()? {
            config = config.probe_url(probe_url);
        }
        Ok(config)
    }

    /// Connection configuration for the offline queue.
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.storage.database_path.clone())
    }

    pub fn runtime(&self) -> RuntimeSettings {
        RuntimeSettings {
            card_policy: self.card.clone(),
            auto_sync: self.sync.auto_sync,
            check_interval: Duration::from_secs(self.sync.check_interval_secs),
            sync_interval: Duration::from_secs(self.sync.sync_interval_secs),
            sync_pause: Duration::from_millis(self.sync.pause_ms),
        }
    }
}

fn parse_http_url(field: &str, value: &str) -> AgentResult<Url> {
    let url = Url::parse(value)
        .map_err(|e| AgentError::InvalidUrl(format!("{field} {value:?}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AgentError::InvalidUrl(format!(
            "{field} must start with http:// or https://, got: {value}"
        )));
    }

    Ok(url)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
