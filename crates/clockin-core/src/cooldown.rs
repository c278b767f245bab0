//! Per-card cooldown gate.
//!
//! Readers often report one physical tap several times in quick succession.
//! The [`CooldownGate`] admits the first scan of a card and refuses every
//! further scan of the same card until [`COOLDOWN_WINDOW_SECS`] have passed.
//!
//! The gate lives in memory only and is reset when the process restarts.
//! It keeps one entry per distinct card seen during the process lifetime;
//! entries are never evicted.
//!
//! # Examples
//!
//! ```
//! use clockin_core::cooldown::{Admission, CooldownGate};
//! use clockin_core::CardNumber;
//! use std::time::{Duration, Instant};
//!
//! let gate = CooldownGate::new();
//! let card = CardNumber::new("55555").unwrap();
//! let t0 = Instant::now();
//!
//! assert_eq!(gate.admit(&card, t0), Admission::Admitted);
//! assert_eq!(
//!     gate.admit(&card, t0 + Duration::from_secs(3)),
//!     Admission::CoolingDown { remaining_secs: 17 }
//! );
//! assert_eq!(gate.admit(&card, t0 + Duration::from_secs(21)), Admission::Admitted);
//! ```

use crate::constants::COOLDOWN_WINDOW_SECS;
use crate::types::CardNumber;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Result of asking the gate to admit a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Scan accepted; the card's window restarts now.
    Admitted,

    /// Scan refused; the card was accepted less than a window ago.
    CoolingDown {
        /// Whole seconds until the card is admitted again (rounded up).
        remaining_secs: u64,
    },
}

impl Admission {
    /// Returns `true` if the scan was admitted.
    #[inline]
    #[must_use]
    pub fn is_admitted(self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

/// In-memory, per-card, time-windowed suppressor of repeat scans.
#[derive(Debug)]
pub struct CooldownGate {
    window: Duration,
    last_accepted: Mutex<HashMap<CardNumber, Instant>>,
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new()
    }
}

impl CooldownGate {
    /// Create a gate with the standard 20-second window.
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(COOLDOWN_WINDOW_SECS))
    }

    /// Create a gate with a custom window.
    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            last_accepted: Mutex::new(HashMap::new()),
        }
    }

    /// Window applied between two accepted scans of one card.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Try to admit a scan of `card` at `now`.
    ///
    /// Check and update happen under one lock, so two concurrent reads of
    /// the same card cannot both be admitted. The update is complete when
    /// this returns, before the caller starts any delivery work.
    pub fn admit(&self, card: &CardNumber, now: Instant) -> Admission {
        let mut last_accepted = self
            .last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(&last) = last_accepted.get(card) {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.window {
                return Admission::CoolingDown {
                    remaining_secs: ceil_secs(self.window - elapsed),
                };
            }
        }

        last_accepted.insert(card.clone(), now);
        Admission::Admitted
    }

    /// Number of cards currently tracked.
    pub fn len(&self) -> usize {
        self.last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no card has been admitted yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
