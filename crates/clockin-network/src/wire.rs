//! JSON bodies exchanged with the attendance server.
//!
//! # Submission
//!
//! ```json
//! {"cardNumber": "12345", "timestamp": "2025-05-10T12:46:06.123456Z", "source": "RFIDR"}
//! ```
//!
//! `timestamp` is always the scan time in UTC with microseconds, also when a
//! queued scan is replayed hours later.
//!
//! # Acceptance (HTTP 201)
//!
//! ```json
//! {"success": true, "message": "...",
//!  "attendance": {"agent": {"name": "Ana"}, "action": "CHECK_IN", "status": "ON_TIME"}}
//! ```
//!
//! Every field of the reply is optional; the server has changed shape over
//! time and a missing field must not turn an accepted scan into a failure.

use chrono::{DateTime, Utc};
use clockin_core::constants::WIRE_TIMESTAMP_FORMAT;
use clockin_core::{CardEvent, EventSource};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `POST <server_url>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSubmission {
    pub card_number: String,
    pub timestamp: String,
    pub source: EventSource,
}

impl ScanSubmission {
    /// Build a submission for `card_number` scanned at `observed_at`.
    pub fn new(
        card_number: impl Into<String>,
        observed_at: DateTime<Utc>,
        source: EventSource,
    ) -> Self {
        Self {
            card_number: card_number.into(),
            timestamp: observed_at.format(WIRE_TIMESTAMP_FORMAT).to_string(),
            source,
        }
    }

    /// Live submission of a freshly normalized scan.
    pub fn realtime(event: &CardEvent) -> Self {
        Self::new(event.card_number.as_str(), event.observed_at, EventSource::Realtime)
    }

    /// Replay of a queued scan, keeping its original scan time.
    pub fn offline(card_number: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self::new(card_number, observed_at, EventSource::Offline)
    }
}

/// Body of an HTTP 201 reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthorityReply {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub attendance: Option<AttendanceBody>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AttendanceBody {
    pub agent: Option<AgentBody>,
    pub action: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AgentBody {
    pub name: Option<String>,
}

impl AuthorityReply {
    /// Returns `true` when the server explicitly reported failure despite 201.
    pub fn reports_failure(&self) -> bool {
        self.success == Some(false)
    }

    pub fn into_receipt(self) -> Receipt {
        let attendance = self.attendance.unwrap_or_default();
        Receipt {
            agent_name: attendance.agent.and_then(|agent| agent.name),
            action: attendance.action,
            status: attendance.status,
            message: self.message,
        }
    }
}

/// What the server recorded for an accepted scan.
///
/// Used for operator feedback only; the agent makes no decision based on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub agent_name: Option<String>,
    pub action: Option<String>,
    pub status: Option<String>,
    pub message: Option<String>,
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (&self.agent_name, &self.action) {
            (Some(name), Some(action)) => write!(f, "{name}: {action}")?,
            (Some(name), None) => f.write_str(name)?,
            (None, Some(action)) => f.write_str(action)?,
            (None, None) => f.write_str(self.message.as_deref().unwrap_or("accepted"))?,
        }
        if let Some(status) = &self.status {
            write!(f, " ({status})")?;
        }
        Ok(())
    }
}
