//! # Agent Error Types
//!
//! Only configuration errors and the initial database open are fatal. Every
//! failure on the scan path or during sync is turned into an outcome and
//! published; the variants below surface where a caller asked for something
//! directly (a manual sync, a status query, loading the config file).

use clockin_network::AuthorityError;
use clockin_storage::StorageError;
use thiserror::Error;

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid server or probe URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Config file could not be parsed.
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // =========================================================================
    // Runtime Errors
    // =========================================================================
    /// A sync pass is already running; the request was dropped.
    #[error("A sync pass is already in progress")]
    SyncInProgress,

    /// Offline queue failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Attendance server client failure.
    #[error("Attendance server error: {0}")]
    Authority(#[from] AuthorityError),

    /// Filesystem or stream error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
