use thiserror::Error;

/// Storage-specific error types for the Clockin agent.
///
/// These errors represent failures of the local pending-scan queue. Apart
/// from the initial open/migrate, none of them is fatal: callers log them and
/// keep the scan path running.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection or query execution failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration execution failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Entity not found in database
    #[error("Entity not found: {entity_type} with {field}={value}")]
    NotFound {
        entity_type: String,
        field: String,
        value: String,
    },

    /// Filesystem error while exporting
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
