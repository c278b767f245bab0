//! Core constants shared by every Clockin crate.
//!
//! These values fix the behavior of the scan path (card length, cooldown
//! window) and the wire contract with the attendance authority (submission
//! sources, timestamp format). Runtime-tunable values such as intervals and
//! timeouts live in the agent configuration and only their defaults are
//! declared here.
//!
//! # Usage
//!
//! ```
//! use clockin_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(MIN_CARD_LENGTH, 4);
//! let window = Duration::from_secs(COOLDOWN_WINDOW_SECS);
//! assert_eq!(window.as_secs(), 20);
//! ```

// ============================================================================
// Card Format Constraints
// ============================================================================

/// Minimum length of a canonical card number.
///
/// Applied after whitespace trimming and prefix stripping. Anything shorter
/// is rejected before it can reach the network or the local queue.
pub const MIN_CARD_LENGTH: usize = 4;

/// Default card prefix configured on terminals shipped with zero-padded
/// readers.
///
/// Stripping is opt-in; see `CardPolicy::remove_prefix`.
pub const DEFAULT_CARD_PREFIX: &str = "000";

// ============================================================================
// Deduplication
// ============================================================================

/// Minimum spacing between two accepted scans of the same card (seconds).
///
/// Readers frequently report a single tap two or three times; anything
/// inside this window is treated as the same physical scan.
///
/// # Value: 20 seconds
pub const COOLDOWN_WINDOW_SECS: u64 = 20;

// ============================================================================
// Wire Contract
// ============================================================================

/// Submission source for a scan delivered at the moment it happened.
pub const SOURCE_REALTIME: &str = "RFIDR";

/// Submission source for a scan replayed from the offline queue.
pub const SOURCE_OFFLINE: &str = "RFIDO";

/// `strftime` format of submission timestamps: RFC 3339, UTC, microseconds.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use clockin_core::constants::WIRE_TIMESTAMP_FORMAT;
///
/// let ts = Utc.with_ymd_and_hms(2025, 5, 10, 12, 46, 6).unwrap();
/// assert_eq!(
///     ts.format(WIRE_TIMESTAMP_FORMAT).to_string(),
///     "2025-05-10T12:46:06.000000Z"
/// );
/// ```
pub const WIRE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

// ============================================================================
// Timing Defaults
// ============================================================================

/// Default interval between reachability probes (seconds).
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 10;

/// Default minimum spacing between two periodic sync passes (seconds).
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;

/// Default bound on a single remote call (seconds).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// Default pause between two submissions of one sync pass (milliseconds).
///
/// Keeps a large backlog drain from hammering the authority.
pub const DEFAULT_SYNC_PAUSE_MS: u64 = 500;

// ============================================================================
// Endpoints and Storage Defaults
// ============================================================================

/// Default scan submission endpoint.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3001/api/rfid/scan";

/// Path that replaces the last segment of the submission URL to form the
/// default reachability probe (`.../api/rfid/scan` -> `.../api/rfid/check/test`).
pub const PROBE_PATH: &str = "check/test";

/// Default location of the pending-scan database, relative to the working
/// directory.
pub const DEFAULT_DATABASE_PATH: &str = "clockin.db";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_are_distinct() {
        assert_ne!(SOURCE_REALTIME, SOURCE_OFFLINE);
        assert_eq!(SOURCE_REALTIME.len(), 5);
        assert_eq!(SOURCE_OFFLINE.len(), 5);
    }

    #[test]
    fn test_default_prefix_is_shorter_than_min_length() {
        // A bare prefix must never survive validation on its own.
        assert!(DEFAULT_CARD_PREFIX.len() < MIN_CARD_LENGTH);
    }
}
