//! Raw scan validation and canonicalization.
//!
//! The normalizer is the first stage of the scan path. It turns whatever the
//! reader produced into a [`CardEvent`] or refuses it with a
//! [`RejectionReason`]. It has no side effects: the only inputs are the raw
//! string, the [`CardPolicy`] loaded at startup and the scan timestamp.
//!
//! # Rules
//!
//! 1. Surrounding whitespace is trimmed.
//! 2. Blank input is rejected as [`RejectionReason::Empty`].
//! 3. With `remove_prefix` enabled, a leading `prefix` is stripped.
//! 4. Fewer than [`MIN_CARD_LENGTH`](crate::constants::MIN_CARD_LENGTH)
//!    remaining characters is rejected as [`RejectionReason::TooShort`].
//!
//! # Examples
//!
//! ```
//! use clockin_core::normalizer::normalize;
//! use clockin_core::{CardPolicy, RejectionReason};
//!
//! let event = normalize(" 0001234567\n", &CardPolicy::default()).unwrap();
//! assert_eq!(event.card_number.as_str(), "0001234567");
//!
//! let event = normalize("0001234567", &CardPolicy::stripping("000")).unwrap();
//! assert_eq!(event.card_number.as_str(), "1234567");
//!
//! assert_eq!(normalize("", &CardPolicy::default()).unwrap_err(), RejectionReason::Empty);
//! ```

use crate::constants::MIN_CARD_LENGTH;
use crate::error::RejectionReason;
use crate::types::{CardEvent, CardNumber, CardPolicy};
use chrono::{DateTime, Utc};

/// Normalize a raw scan, stamping it with the current UTC time.
///
/// # Errors
///
/// See [`normalize_at`].
pub fn normalize(raw: &str, policy: &CardPolicy) -> Result<CardEvent, RejectionReason> {
    normalize_at(raw, policy, Utc::now())
}

/// Normalize a raw scan observed at `observed_at`.
///
/// # Errors
///
/// Returns [`RejectionReason::Empty`] when the trimmed input is blank and
/// [`RejectionReason::TooShort`] when fewer than four characters remain after
/// prefix stripping (a number consisting only of the prefix counts as too
/// short, not empty).
pub fn normalize_at(
    raw: &str,
    policy: &CardPolicy,
    observed_at: DateTime<Utc>,
) -> Result<CardEvent, RejectionReason> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RejectionReason::Empty);
    }

    let candidate = strip_prefix(trimmed, policy);

    let card_number = CardNumber::new(candidate).map_err(|reason| match reason {
        RejectionReason::Empty => RejectionReason::TooShort {
            length: 0,
            minimum: MIN_CARD_LENGTH,
        },
        other => other,
    })?;

    Ok(CardEvent {
        raw: raw.to_string(),
        card_number,
        observed_at,
    })
}

fn strip_prefix<'a>(number: &'a str, policy: &CardPolicy) -> &'a str {
    if !policy.remove_prefix || policy.prefix.is_empty() {
        return number;
    }
    number.strip_prefix(policy.prefix.as_str()).unwrap_or(number)
}
