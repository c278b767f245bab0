#![allow(async_fn_in_trait)]

use crate::error::{StorageError, StorageResult};
use crate::models::PendingScan;
use chrono::{DateTime, Utc};
use clockin_core::CardNumber;
use sqlx::SqlitePool;
use tracing::debug;

/// Repository trait for the offline scan queue.
///
/// Every method is a single statement; no lock or transaction is held across
/// calls, so callers are free to interleave network I/O between them.
///
/// # Implementation Note
///
/// This trait uses native async trait methods (Edition 2024 feature),
/// eliminating the need for the async-trait crate while maintaining
/// full async/await support in trait methods.
pub trait PendingScanRepository: Send + Sync {
    /// Append a scan to the queue and return its id.
    ///
    /// The row is on disk when this returns.
    async fn enqueue(&self, card_number: &CardNumber, observed_at: DateTime<Utc>)
    -> StorageResult<i64>;

    /// All queued scans, oldest `observed_at` first (ties by id).
    async fn list_pending(&self) -> StorageResult<Vec<PendingScan>>;

    /// Remove a scan the server has accepted.
    async fn delete(&self, id: i64) -> StorageResult<()>;

    /// Count one more failed replay of a scan.
    async fn record_attempt(&self, id: i64) -> StorageResult<()>;

    /// Number of queued scans.
    async fn count(&self) -> StorageResult<i64>;

    /// Remove every queued scan and return how many were removed.
    async fn clear_all(&self) -> StorageResult<u64>;

    /// Queued scans of one card, oldest first.
    async fn find_by_card_number(&self, card_number: &str) -> StorageResult<Vec<PendingScan>>;
}

/// SQLite implementation of PendingScanRepository
#[derive(Debug, Clone)]
pub struct SqlitePendingScanRepository {
    pool: SqlitePool,
}

impl SqlitePendingScanRepository {
    /// Create a new SQLite pending-scan repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl PendingScanRepository for SqlitePendingScanRepository {
    async fn enqueue(
        &self,
        card_number: &CardNumber,
        observed_at: DateTime<Utc>,
    ) -> StorageResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO pending_scans (card_number, observed_at, created_at, sync_attempts)
            VALUES (?, ?, ?, 0)
            "#,
        )
        .bind(card_number.as_str())
        .bind(observed_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(id, card = %card_number, "Scan queued");
        Ok(id)
    }

    async fn list_pending(&self) -> StorageResult<Vec<PendingScan>> {
        let scans = sqlx::query_as::<_, PendingScan>(
            r#"
            SELECT id, card_number, observed_at, created_at, sync_attempts
            FROM pending_scans
            ORDER BY observed_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(scans)
    }

    async fn delete(&self, id: i64) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM pending_scans WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity_type: "PendingScan".to_string(),
                field: "id".to_string(),
                value: id.to_string(),
            });
        }

        Ok(())
    }

    async fn record_attempt(&self, id: i64) -> StorageResult<()> {
        let result =
            sqlx::query("UPDATE pending_scans SET sync_attempts = sync_attempts + 1 WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity_type: "PendingScan".to_string(),
                field: "id".to_string(),
                value: id.to_string(),
            });
        }

        Ok(())
    }

    async fn count(&self) -> StorageResult<i64> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pending_scans")
            .fetch_one(&self.pool)
            .await?;

        Ok(result.0)
    }

    async fn clear_all(&self) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM pending_scans")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn find_by_card_number(&self, card_number: &str) -> StorageResult<Vec<PendingScan>> {
        let scans = sqlx::query_as::<_, PendingScan>(
            r#"
            SELECT id, card_number, observed_at, created_at, sync_attempts
            FROM pending_scans
            WHERE card_number = ?
            ORDER BY observed_at ASC, id ASC
            "#,
        )
        .bind(card_number)
        .fetch_all(&self.pool)
        .await?;

        Ok(scans)
    }
}
