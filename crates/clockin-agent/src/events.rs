//! Events published by the running agent.
//!
//! Every scan produces exactly one [`AgentEvent::Scan`], whatever happened to
//! it. Background work (sync passes, connectivity transitions, toggles)
//! publishes its own events on the same channel, so a single consumer sees a
//! complete, ordered account of what the agent did.

use clockin_core::{CardNumber, RejectionReason};
use clockin_network::Receipt;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

use crate::state::Reachability;
use crate::sync::SyncSummary;

/// Default capacity of the event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Delay before the single retry when the event channel is full.
const BACKPRESSURE_DELAY: Duration = Duration::from_millis(100);

/// Why a scan was dropped without being recorded anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanRejection {
    /// Nothing but whitespace was read.
    Empty,

    /// Fewer than the minimum number of characters.
    TooShort { length: usize, minimum: usize },

    /// Same card accepted less than a cooldown window ago.
    Cooldown { card: CardNumber, remaining_secs: u64 },

    /// The server does not know the card.
    Unregistered { card: CardNumber },
}

impl From<RejectionReason> for ScanRejection {
    fn from(reason: RejectionReason) -> Self {
        match reason {
            RejectionReason::Empty => ScanRejection::Empty,
            RejectionReason::TooShort { length, minimum } => {
                ScanRejection::TooShort { length, minimum }
            }
        }
    }
}

impl fmt::Display for ScanRejection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScanRejection::Empty => write!(f, "empty card number"),
            ScanRejection::TooShort { length, minimum } => {
                write!(f, "card number too short ({length} < {minimum})")
            }
            ScanRejection::Cooldown {
                card,
                remaining_secs,
            } => write!(f, "card {card} cooling down, wait {remaining_secs}s"),
            ScanRejection::Unregistered { card } => write!(f, "card {card} is not registered"),
        }
    }
}

/// Why a scan went to the offline queue instead of the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueReason {
    /// The last probe found the server unreachable; no request was made.
    RemoteUnreachable,

    /// The request failed without a reply (timeout, refused, reset).
    DeliveryFailed(String),

    /// The server answered with a status other than 201 or 404.
    ServerError { status: u16 },

    /// The server answered but the reply could not be read or parsed.
    MalformedReply { status: u16 },
}

impl fmt::Display for QueueReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueueReason::RemoteUnreachable => write!(f, "server unreachable"),
            QueueReason::DeliveryFailed(reason) => write!(f, "delivery failed: {reason}"),
            QueueReason::ServerError { status } => write!(f, "server answered HTTP {status}"),
            QueueReason::MalformedReply { status } => {
                write!(f, "unreadable reply to HTTP {status}")
            }
        }
    }
}

/// Final outcome of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The server recorded the scan.
    Delivered { card: CardNumber, receipt: Receipt },

    /// Dropped without being recorded.
    Rejected(ScanRejection),

    /// Stored in the offline queue under `id`.
    Queued {
        card: CardNumber,
        id: i64,
        reason: QueueReason,
    },

    /// The server accepted the request but reported that it did not record
    /// the scan; stored under `id`.
    QueuedAfterRemoteRejection {
        card: CardNumber,
        id: i64,
        message: String,
    },

    /// Neither delivered nor stored. The scan is lost.
    NotPersisted { card: CardNumber, error: String },
}

impl ScanOutcome {
    /// Offline queue id, if the scan was stored.
    pub fn queued_id(&self) -> Option<i64> {
        match self {
            ScanOutcome::Queued { id, .. } | ScanOutcome::QueuedAfterRemoteRejection { id, .. } => {
                Some(*id)
            }
            _ => None,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, ScanOutcome::Delivered { .. })
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScanOutcome::Delivered { card, receipt } => {
                write!(f, "card {card} delivered: {receipt}")
            }
            ScanOutcome::Rejected(rejection) => write!(f, "rejected: {rejection}"),
            ScanOutcome::Queued { card, id, reason } => {
                write!(f, "card {card} queued as #{id} ({reason})")
            }
            ScanOutcome::QueuedAfterRemoteRejection { card, id, message } => {
                write!(f, "card {card} queued as #{id} (server refused: {message})")
            }
            ScanOutcome::NotPersisted { card, error } => {
                write!(f, "card {card} NOT recorded: {error}")
            }
        }
    }
}

/// Everything the agent reports to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// One scan was handled.
    Scan { raw: String, outcome: ScanOutcome },

    /// A sync pass finished (manual or periodic).
    SyncCompleted(SyncSummary),

    /// A sync pass could not run or aborted on a storage error.
    SyncFailed { error: String },

    /// The server became reachable or unreachable.
    ConnectivityChanged { from: Reachability, to: Reachability },

    /// Automatic sync was switched on or off.
    AutoSyncToggled { enabled: bool },
}

/// Cloneable publishing side of the event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<AgentEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<AgentEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink and its receiver.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AgentEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Publish an event.
    ///
    /// [`AgentEvent::Scan`] is always delivered: a full channel makes the
    /// publisher wait for the consumer. Other events get one retry after a
    /// short delay and are dropped with a warning if the consumer is still
    /// behind. A closed channel is ignored.
    pub async fn publish(&self, event: AgentEvent) {
        if let AgentEvent::Scan { .. } = event {
            if let Err(TrySendError::Full(event)) = self.tx.try_send(event) {
                warn!("Event channel full, waiting for consumer");
                // Err only means the consumer is gone.
                let _ = self.tx.send(event).await;
            }
            return;
        }

        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!("Event channel full, applying backpressure");
                tokio::time::sleep(BACKPRESSURE_DELAY).await;
                if let Err(TrySendError::Full(dropped)) = self.tx.try_send(event) {
                    warn!(event = ?dropped, "Event channel still full, dropping event");
                }
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
