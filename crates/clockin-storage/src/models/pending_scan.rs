use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scan waiting in the offline queue for confirmation by the server.
///
/// # Fields
///
/// * `id` - Auto-increment primary key, strictly increasing in insert order
/// * `card_number` - Canonical card number as validated at scan time
/// * `observed_at` - When the card was read (sent unchanged on replay)
/// * `created_at` - When the row was written to the queue
/// * `sync_attempts` - Failed replay attempts so far
///
/// # Lifecycle
///
/// A row is created when live delivery fails or is skipped and deleted only
/// after the server answers a replay with HTTP 201, or when an operator
/// purges the queue. Cards the server does not know stay queued; their
/// `sync_attempts` grows with every pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PendingScan {
    /// Auto-increment primary key
    pub id: i64,

    /// Canonical card number
    pub card_number: String,

    /// Scan time captured by the reader, not the sync time
    pub observed_at: DateTime<Utc>,

    /// Queue insertion time
    pub created_at: DateTime<Utc>,

    /// Number of failed replay attempts
    pub sync_attempts: i64,
}
