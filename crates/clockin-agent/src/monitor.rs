//! Periodic reachability probing.

use chrono::Utc;
use clockin_network::{ProbeOutcome, RemoteAuthority};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::events::{AgentEvent, EventSink};
use crate::state::{ConnectivityState, Reachability};

/// Probes the attendance server every `interval` and keeps
/// [`ConnectivityState`] current.
pub struct ConnectivityMonitor<A> {
    authority: Arc<A>,
    state: ConnectivityState,
    events: EventSink,
    interval: Duration,
}

impl<A: RemoteAuthority> ConnectivityMonitor<A> {
    pub fn new(
        authority: Arc<A>,
        state: ConnectivityState,
        events: EventSink,
        interval: Duration,
    ) -> Self {
        Self {
            authority,
            state,
            events,
            interval,
        }
    }

    /// Run one probe and record the result.
    ///
    /// A change of reachability is logged and published; a steady state is
    /// only traced at debug level.
    pub async fn check_once(&self) -> ProbeOutcome {
        let outcome = self.authority.probe().await;

        match self.state.record_probe(outcome.is_reachable(), Utc::now()) {
            Some(from) => {
                let to = self.state.reachability();
                match to {
                    Reachability::Reachable => info!(%from, %outcome, "Attendance server online"),
                    _ => warn!(%from, %outcome, "Attendance server offline"),
                }
                self.events
                    .publish(AgentEvent::ConnectivityChanged { from, to })
                    .await;
            }
            None => debug!(%outcome, "Connectivity unchanged"),
        }

        outcome
    }

    /// Probe on every tick until `shutdown` flips to `true` or its sender is
    /// dropped. The first probe runs immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.interval.as_secs_f64(),
            "Connectivity monitor started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    self.check_once().await;
                }
            }
        }

        info!("Connectivity monitor stopped");
    }
}
