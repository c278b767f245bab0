//! Live scan handling: validate, deduplicate, deliver, fall back to the queue.
//!
//! ```text
//! raw ──> normalize ──> cooldown ──> reachable? ──> POST ──> 201  Delivered
//!            │             │             │           ├────> 201  success:false
//!            │             │             │           │           QueuedAfterRemoteRejection
//!            │             │             │           ├────> 201  unreadable body
//!            │             │             │           │           Queued(MalformedReply)
//!            ▼             ▼             │           ├────> 404  Rejected(Unregistered)
//!        Rejected      Rejected          │           ├────> 5xx  Queued(ServerError)
//!                                        │           └────> none Queued(DeliveryFailed)
//!                                        └──────────────────────> Queued(RemoteUnreachable)
//! ```
//!
//! A scan is never lost silently: when the queue write fails after a failed
//! delivery the outcome is [`ScanOutcome::NotPersisted`] and an error is
//! logged.

use chrono::{DateTime, Utc};
use clockin_core::{Admission, CardEvent, CardPolicy, CooldownGate, normalize_at};
use clockin_network::{AuthorityError, RemoteAuthority, ScanSubmission};
use clockin_storage::{PendingScanRepository, SqlitePendingScanRepository};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::events::{QueueReason, ScanOutcome, ScanRejection};
use crate::state::ConnectivityState;

/// Why a delivery attempt ended in the queue.
enum Fallback {
    Queue(QueueReason),
    Refused(String),
}

impl From<AuthorityError> for Fallback {
    fn from(error: AuthorityError) -> Self {
        match error {
            AuthorityError::Refused { detail } => Fallback::Refused(detail),
            AuthorityError::Server { status, .. } => {
                Fallback::Queue(QueueReason::ServerError { status })
            }
            AuthorityError::MalformedReply { status, .. } => {
                Fallback::Queue(QueueReason::MalformedReply { status })
            }
            other => Fallback::Queue(QueueReason::DeliveryFailed(other.to_string())),
        }
    }
}

pub struct IngestionPipeline<A, R = SqlitePendingScanRepository> {
    policy: CardPolicy,
    gate: CooldownGate,
    repo: R,
    authority: Arc<A>,
    connectivity: ConnectivityState,
}

impl<A: RemoteAuthority, R: PendingScanRepository> IngestionPipeline<A, R> {
    pub fn new(
        policy: CardPolicy,
        repo: R,
        authority: Arc<A>,
        connectivity: ConnectivityState,
    ) -> Self {
        Self {
            policy,
            gate: CooldownGate::new(),
            repo,
            authority,
            connectivity,
        }
    }

    /// Replace the cooldown gate (custom window).
    pub fn with_gate(mut self, gate: CooldownGate) -> Self {
        self.gate = gate;
        self
    }

    /// Cards currently tracked by the cooldown gate.
    pub fn tracked_cards(&self) -> usize {
        self.gate.len()
    }

    /// Handle one raw scan read now.
    pub async fn handle_scan(&self, raw: &str) -> ScanOutcome {
        self.handle_scan_at(raw, Utc::now(), Instant::now()).await
    }

    /// Handle one raw scan observed at `observed_at` (wall clock) / `now`
    /// (cooldown clock).
    pub async fn handle_scan_at(
        &self,
        raw: &str,
        observed_at: DateTime<Utc>,
        now: Instant,
    ) -> ScanOutcome {
        let event = match normalize_at(raw, &self.policy, observed_at) {
            Ok(event) => event,
            Err(reason) => {
                debug!(raw, %reason, "Scan rejected");
                return ScanOutcome::Rejected(reason.into());
            }
        };

        if let Admission::CoolingDown { remaining_secs } = self.gate.admit(&event.card_number, now)
        {
            info!(card = %event.card_number, remaining_secs, "Scan ignored during cooldown");
            return ScanOutcome::Rejected(ScanRejection::Cooldown {
                card: event.card_number,
                remaining_secs,
            });
        }

        if self.connectivity.is_unreachable() {
            return self
                .fall_back(event, Fallback::Queue(QueueReason::RemoteUnreachable))
                .await;
        }

        match self.authority.submit(&ScanSubmission::realtime(&event)).await {
            Ok(receipt) => {
                info!(card = %event.card_number, %receipt, "Scan delivered");
                ScanOutcome::Delivered {
                    card: event.card_number,
                    receipt,
                }
            }
            Err(e) if e.is_business_rejection() => {
                warn!(card = %event.card_number, "Card not registered");
                ScanOutcome::Rejected(ScanRejection::Unregistered {
                    card: event.card_number,
                })
            }
            Err(e) => {
                warn!(card = %event.card_number, error = %e, "Scan delivery failed");
                self.fall_back(event, e.into()).await
            }
        }
    }

    async fn fall_back(&self, event: CardEvent, fallback: Fallback) -> ScanOutcome {
        let card = event.card_number;

        let id = match self.repo.enqueue(&card, event.observed_at).await {
            Ok(id) => id,
            Err(e) => {
                error!(
                    card = %card,
                    observed_at = %event.observed_at,
                    error = %e,
                    "Scan could not be delivered or stored; it is lost"
                );
                return ScanOutcome::NotPersisted {
                    card,
                    error: e.to_string(),
                };
            }
        };

        info!(card = %card, id, "Scan stored in offline queue");

        match fallback {
            Fallback::Queue(reason) => ScanOutcome::Queued { card, id, reason },
            Fallback::Refused(message) => {
                ScanOutcome::QueuedAfterRemoteRejection { card, id, message }
            }
        }
    }
}
