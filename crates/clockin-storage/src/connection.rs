use crate::error::{StorageError, StorageResult};
use clockin_core::constants::DEFAULT_DATABASE_PATH;
use sqlx::ConnectOptions;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Database connection configuration for SQLite
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of idle connections to maintain
    pub min_connections: u32,

    /// Maximum lifetime of a connection before it's closed
    pub max_lifetime: Duration,

    /// Timeout for acquiring a connection from the pool
    pub acquire_timeout: Duration,

    /// Whether to create the database file if it doesn't exist
    pub create_if_missing: bool,

    /// Whether to run migrations on connection
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            max_connections: 4,
            min_connections: 1,
            max_lifetime: Duration::from_secs(1800), // 30 minutes
            acquire_timeout: Duration::from_secs(30),
            create_if_missing: true,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    /// Create a new database configuration with the given path
    pub fn new(database_path: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Default::default()
        }
    }

    /// Set the maximum number of connections in the pool
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the minimum number of idle connections
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Set whether to create the database if it doesn't exist
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Set whether to run migrations automatically
    pub fn auto_migrate(mut self, migrate: bool) -> Self {
        self.auto_migrate = migrate;
        self
    }
}

/// Database connection pool wrapper
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the pending-scan database.
    ///
    /// Every commit is flushed to disk before returning (`synchronous =
    /// FULL`), so a scan reported as queued survives a power cut.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use clockin_storage::connection::{Database, DatabaseConfig};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = DatabaseConfig::new("clockin.db").max_connections(4);
    /// let db = Database::new(config).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Fails if the parent directory cannot be created, the file cannot be
    /// opened, or migrations fail. Callers treat this as fatal at startup.
    pub async fn new(config: DatabaseConfig) -> StorageResult<Self> {
        if let Some(parent) = Path::new(&config.database_path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Configuration(format!("Failed to create database directory: {}", e))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", config.database_path))
            .map_err(|e| StorageError::Configuration(format!("Invalid database path: {}", e)))?
            .create_if_missing(config.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(Duration::from_secs(10))
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .max_lifetime(Some(config.max_lifetime))
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;

        let db = Self { pool };

        if config.auto_migrate {
            db.migrate().await?;
        }

        info!(path = %config.database_path, "Pending-scan database opened");
        Ok(db)
    }

    /// Create an in-memory database (primarily for testing)
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .journal_mode(SqliteJournalMode::Wal)
            .disable_statement_logging();

        // A second connection would open a different, empty in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .max_lifetime(None)
            .idle_timeout(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    /// Run the embedded migrations.
    ///
    /// Migrations only ever create missing objects; existing pending scans
    /// are left untouched, so running this on every start is safe.
    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        debug!("Database migrations applied");
        Ok(())
    }

    /// Get a reference to the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool
    ///
    /// This will wait for all active connections to be returned to the pool
    /// before closing them.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Check if the database connection is healthy
    pub async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
