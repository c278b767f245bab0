//! Shared connectivity state.
//!
//! Written by the connectivity monitor (probe results) and the sync engine
//! (completed passes); read by the ingestion pipeline, the periodic sync gate
//! and status queries.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

/// What the agent currently believes about the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Reachability {
    /// No probe has completed yet.
    #[default]
    Unknown,
    Reachable,
    Unreachable,
}

impl Reachability {
    pub fn from_probe(reachable: bool) -> Self {
        if reachable {
            Reachability::Reachable
        } else {
            Reachability::Unreachable
        }
    }
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Reachability::Unknown => write!(f, "unknown"),
            Reachability::Reachable => write!(f, "online"),
            Reachability::Unreachable => write!(f, "offline"),
        }
    }
}

/// Point-in-time copy of [`ConnectivityState`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectivitySnapshot {
    pub reachability: Reachability,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Inner {
    snapshot: ConnectivitySnapshot,
    last_sync_mark: Option<Instant>,
}

/// Cloneable handle to the agent's connectivity state.
#[derive(Debug, Clone, Default)]
pub struct ConnectivityState {
    inner: Arc<RwLock<Inner>>,
}

impl ConnectivityState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a probe result.
    ///
    /// Returns the previous reachability when it changed.
    pub fn record_probe(&self, reachable: bool, at: DateTime<Utc>) -> Option<Reachability> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let previous = inner.snapshot.reachability;
        let current = Reachability::from_probe(reachable);

        inner.snapshot.reachability = current;
        inner.snapshot.last_checked_at = Some(at);

        (previous != current).then_some(previous)
    }

    /// Note that a sync pass completed at `at` (wall clock) / `mark` (monotonic).
    pub fn record_sync(&self, at: DateTime<Utc>, mark: Instant) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.snapshot.last_synced_at = Some(at);
        inner.last_sync_mark = Some(mark);
    }

    pub fn snapshot(&self) -> ConnectivitySnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot
            .clone()
    }

    pub fn reachability(&self) -> Reachability {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot
            .reachability
    }

    /// `true` only when the last probe failed. `Unknown` is not unreachable.
    pub fn is_unreachable(&self) -> bool {
        self.reachability() == Reachability::Unreachable
    }

    pub fn is_reachable(&self) -> bool {
        self.reachability() == Reachability::Reachable
    }

    /// Time since the last completed sync, or `None` if none happened yet.
    pub fn since_last_sync(&self, now: Instant) -> Option<Duration> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_sync_mark
            .map(|mark| now.saturating_duration_since(mark))
    }
}
