use crate::{
    constants::{DEFAULT_CARD_PREFIX, MIN_CARD_LENGTH, SOURCE_OFFLINE, SOURCE_REALTIME},
    error::{Error, RejectionReason},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical card number (trimmed, prefix-adjusted, at least 4 characters).
///
/// This is the key used for deduplication, for the offline queue and for
/// the `cardNumber` field sent to the authority. Holding a `CardNumber`
/// proves the value passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardNumber(String);

impl CardNumber {
    /// Create a new card number with validation.
    ///
    /// The input is trimmed; no other transformation is applied (the
    /// authority matches the digits exactly as the reader produced them,
    /// leading zeros included).
    ///
    /// # Errors
    /// Returns [`RejectionReason::Empty`] for blank input and
    /// [`RejectionReason::TooShort`] below [`MIN_CARD_LENGTH`] characters.
    pub fn new(number: &str) -> std::result::Result<Self, RejectionReason> {
        let number = number.trim();
        if number.is_empty() {
            return Err(RejectionReason::Empty);
        }

        let length = number.chars().count();
        if length < MIN_CARD_LENGTH {
            return Err(RejectionReason::TooShort {
                length,
                minimum: MIN_CARD_LENGTH,
            });
        }

        Ok(CardNumber(number.to_string()))
    }

    /// Get the card number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the card number and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CardNumber {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Ok(CardNumber::new(s)?)
    }
}

impl TryFrom<String> for CardNumber {
    type Error = RejectionReason;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        CardNumber::new(&value)
    }
}

impl From<CardNumber> for String {
    fn from(card: CardNumber) -> Self {
        card.0
    }
}

impl AsRef<str> for CardNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Where a submission comes from, as reported to the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventSource {
    /// Delivered at scan time.
    #[serde(rename = "RFIDR")]
    Realtime,
    /// Replayed from the offline queue.
    #[serde(rename = "RFIDO")]
    Offline,
}

impl EventSource {
    /// Wire code of the source (`RFIDR` / `RFIDO`).
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EventSource::Realtime => SOURCE_REALTIME,
            EventSource::Offline => SOURCE_OFFLINE,
        }
    }

    /// Returns `true` for replayed scans.
    #[inline]
    #[must_use]
    pub fn is_offline(self) -> bool {
        matches!(self, EventSource::Offline)
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One physical scan that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardEvent {
    /// Identifier exactly as read from the device.
    pub raw: String,

    /// Canonical identifier.
    pub card_number: CardNumber,

    /// UTC time of the scan, captured when the card was read (not when it
    /// was finally delivered).
    pub observed_at: DateTime<Utc>,
}

/// Prefix handling applied by the normalizer.
///
/// Some readers left-pad card numbers with a fixed prefix (`000` on the
/// SYC ID&IC units). When `remove_prefix` is set, a leading `prefix` is
/// stripped before length validation; by default numbers pass through
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPolicy {
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default)]
    pub remove_prefix: bool,
}

fn default_prefix() -> String {
    DEFAULT_CARD_PREFIX.to_string()
}

impl Default for CardPolicy {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            remove_prefix: false,
        }
    }
}

impl CardPolicy {
    /// Policy that strips `prefix` from incoming numbers.
    pub fn stripping(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            remove_prefix: true,
        }
    }
}
