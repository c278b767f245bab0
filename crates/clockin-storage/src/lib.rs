//! Storage layer for the Clockin agent.
//!
//! This crate owns the offline queue: scans that could not be delivered to
//! the attendance server at the moment they happened. It is a single SQLite
//! table, `pending_scans`, accessed through a repository trait.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool manager with embedded migrations
//! - [`PendingScanRepository`] - Data access trait for the queue
//! - [`export`] - CSV export of the queue for operators
//!
//! # Durability
//!
//! The database runs in WAL mode with `synchronous = FULL`: a scan reported
//! as queued is on disk. Migrations only create missing objects, so pending
//! scans survive restarts and upgrades.
//!
//! # Examples
//!
//! ```no_run
//! use clockin_core::CardNumber;
//! use clockin_storage::{Database, DatabaseConfig};
//! use clockin_storage::repositories::{PendingScanRepository, SqlitePendingScanRepository};
//! use chrono::Utc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("clockin.db")).await?;
//! let queue = SqlitePendingScanRepository::new(db.pool().clone());
//!
//! let card = CardNumber::new("12345")?;
//! queue.enqueue(&card, Utc::now()).await?;
//!
//! for scan in queue.list_pending().await? {
//!     println!("{} {} ({} failed attempts)", scan.observed_at, scan.card_number, scan.sync_attempts);
//! }
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod export;
pub mod models;
pub mod repositories;

pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use export::{ExportOutcome, export_pending};
pub use models::PendingScan;
pub use repositories::{PendingScanRepository, SqlitePendingScanRepository};
