//! Agent assembly and lifecycle.
//!
//! # Architecture
//!
//! ```text
//!  scan source ──> ingestion task ──┐
//!  submit_scan() ───────────────────┤
//!                                   ├──> mpsc<AgentEvent> ──> AgentHandle::recv()
//!  connectivity task (probe loop) ──┤
//!  sync task (periodic gate) ───────┤
//!  trigger_sync() ──────────────────┘
//! ```
//!
//! All tasks share one [`IngestionPipeline`], one [`SyncEngine`] and one
//! [`ConnectivityState`]. Shutdown is signalled through a `watch` channel;
//! tasks finish their current step and stop.
//!
//! # Lifecycle
//!
//! 1. Open the [`Database`] and build the authority client
//! 2. `Agent::new(settings, &db, authority)`
//! 3. `start()` spawns the connectivity and sync loops and returns a handle
//! 4. Feed scans with `attach_reader()` or `submit_scan()`, consume events
//!    with `recv()`
//! 5. `shutdown()` stops every task
//!
//! # Examples
//!
//! ```no_run
//! use clockin_agent::{Agent, AgentConfig};
//! use clockin_network::HttpAuthority;
//! use clockin_storage::Database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AgentConfig::load(None)?;
//! let db = Database::new(config.database_config()).await?;
//! let authority = HttpAuthority::new(config.authority_config()?)?;
//!
//! let mut handle = Agent::new(config.runtime(), &db, authority).start();
//! handle.attach_reader(tokio::io::stdin());
//!
//! while let Some(event) = handle.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use clockin_network::RemoteAuthority;
use clockin_storage::{Database, SqlitePendingScanRepository};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::RuntimeSettings;
use crate::error::{AgentError, AgentResult};
use crate::events::{AgentEvent, EVENT_CHANNEL_CAPACITY, EventSink, ScanOutcome};
use crate::input::ScanReader;
use crate::monitor::ConnectivityMonitor;
use crate::pipeline::IngestionPipeline;
use crate::state::{ConnectivityState, Reachability};
use crate::sync::{PeriodicSync, SyncEngine, SyncSummary};

/// How long `shutdown` waits for tasks before aborting them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Snapshot returned by [`AgentHandle::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStatus {
    pub reachability: Reachability,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub pending: i64,
    pub auto_sync: bool,
    pub syncing: bool,
    pub tracked_cards: usize,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "server {}, {} pending, auto-sync {}",
            self.reachability,
            self.pending,
            if self.auto_sync { "on" } else { "off" }
        )?;
        if self.syncing {
            write!(f, ", syncing")?;
        }
        Ok(())
    }
}

/// Configured but not yet running agent.
pub struct Agent<A> {
    settings: RuntimeSettings,
    repo: SqlitePendingScanRepository,
    authority: Arc<A>,
    state: ConnectivityState,
}

impl<A: RemoteAuthority + 'static> Agent<A> {
    pub fn new(settings: RuntimeSettings, db: &Database, authority: A) -> Self {
        Self {
            settings,
            repo: SqlitePendingScanRepository::new(db.pool().clone()),
            authority: Arc::new(authority),
            state: ConnectivityState::new(),
        }
    }

    /// Spawn the connectivity and sync loops and return the control handle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> AgentHandle<A> {
        let (events, event_rx) = EventSink::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let auto_sync = Arc::new(AtomicBool::new(self.settings.auto_sync));

        let pipeline = Arc::new(IngestionPipeline::new(
            self.settings.card_policy.clone(),
            self.repo.clone(),
            self.authority.clone(),
            self.state.clone(),
        ));
        let engine = Arc::new(SyncEngine::new(
            self.repo.clone(),
            self.authority.clone(),
            self.settings.sync_pause,
        ));

        let mut tasks = JoinSet::new();

        let monitor = ConnectivityMonitor::new(
            self.authority.clone(),
            self.state.clone(),
            events.clone(),
            self.settings.check_interval,
        );
        let rx = shutdown_rx.clone();
        tasks.spawn(async move {
            monitor.run(rx).await;
            Ok(())
        });

        let periodic = PeriodicSync::new(
            engine.clone(),
            self.state.clone(),
            auto_sync.clone(),
            events.clone(),
            self.settings.check_interval,
            self.settings.sync_interval,
        );
        tasks.spawn(async move {
            periodic.run(shutdown_rx).await;
            Ok(())
        });

        info!(
            auto_sync = self.settings.auto_sync,
            check_interval_secs = self.settings.check_interval.as_secs_f64(),
            sync_interval_secs = self.settings.sync_interval.as_secs_f64(),
            "Agent started"
        );

        AgentHandle {
            events,
            event_rx,
            shutdown_tx,
            tasks,
            pipeline,
            engine,
            state: self.state,
            auto_sync,
        }
    }
}

/// Control handle of a running agent.
pub struct AgentHandle<A> {
    events: EventSink,
    event_rx: mpsc::Receiver<AgentEvent>,
    shutdown_tx: watch::Sender<bool>,
    tasks: JoinSet<AgentResult<()>>,
    pipeline: Arc<IngestionPipeline<A>>,
    engine: Arc<SyncEngine<A>>,
    state: ConnectivityState,
    auto_sync: Arc<AtomicBool>,
}

impl<A: RemoteAuthority + 'static> AgentHandle<A> {
    /// Receive the next event.
    ///
    /// Never returns `None` while the handle is alive, since the handle
    /// itself keeps a sender.
    pub async fn recv(&mut self) -> Option<AgentEvent> {
        self.event_rx.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<AgentEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Handle one scan now and publish its outcome.
    pub async fn submit_scan(&self, raw: &str) -> ScanOutcome {
        handle_and_publish(&self.pipeline, &self.events, raw.to_string()).await
    }

    /// Feed scans from `reader` in a background task until the stream ends
    /// or the agent shuts down.
    pub fn attach_reader<R>(&mut self, reader: R)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let pipeline = self.pipeline.clone();
        let events = self.events.clone();
        let mut shutdown = self.shutdown_tx.subscribe();

        self.tasks.spawn(async move {
            let mut reader = ScanReader::new(reader);
            info!("Scan source attached");

            loop {
                let scan = tokio::select! {
                    biased;

                    _ = shutdown.changed() => break,
                    scan = reader.next_scan() => scan?,
                };

                match scan {
                    Some(raw) => {
                        handle_and_publish(&pipeline, &events, raw).await;
                    }
                    None => {
                        info!("Scan source closed");
                        break;
                    }
                }
            }

            Ok(())
        });
    }

    /// Run one sync pass now, regardless of auto-sync and reachability.
    ///
    /// # Errors
    ///
    /// [`AgentError::SyncInProgress`] when a pass is already running, or a
    /// storage error if the queue cannot be read.
    pub async fn trigger_sync(&self) -> AgentResult<SyncSummary> {
        info!("Manual sync requested");

        match self.engine.sync_once().await {
            Ok(summary) => {
                self.state.record_sync(Utc::now(), Instant::now());
                self.events
                    .publish(AgentEvent::SyncCompleted(summary.clone()))
                    .await;
                Ok(summary)
            }
            Err(AgentError::SyncInProgress) => {
                warn!("Manual sync ignored, a pass is already running");
                Err(AgentError::SyncInProgress)
            }
            Err(e) => {
                error!(error = %e, "Manual sync failed");
                self.events
                    .publish(AgentEvent::SyncFailed {
                        error: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    /// Switch automatic sync on or off. Publishes an event when the value
    /// changes.
    pub async fn set_auto_sync(&self, enabled: bool) {
        let previous = self.auto_sync.swap(enabled, Ordering::AcqRel);
        if previous == enabled {
            return;
        }

        if enabled {
            info!("Automatic sync enabled");
        } else {
            warn!("Automatic sync disabled");
        }
        self.events
            .publish(AgentEvent::AutoSyncToggled { enabled })
            .await;
    }

    pub fn auto_sync(&self) -> bool {
        self.auto_sync.load(Ordering::Acquire)
    }

    /// Current connectivity, queue size and settings.
    pub async fn status(&self) -> AgentResult<AgentStatus> {
        let snapshot = self.state.snapshot();

        Ok(AgentStatus {
            reachability: snapshot.reachability,
            last_checked_at: snapshot.last_checked_at,
            last_synced_at: snapshot.last_synced_at,
            pending: self.engine.pending_count().await?,
            auto_sync: self.auto_sync(),
            syncing: self.engine.is_syncing(),
            tracked_cards: self.pipeline.tracked_cards(),
        })
    }

    /// Stop every task.
    ///
    /// Tasks get [`SHUTDOWN_GRACE`] to finish the step they are in (an
    /// in-flight request completes or times out); anything still running
    /// after that is aborted.
    pub async fn shutdown(mut self) -> AgentResult<()> {
        info!("Shutting down agent");
        // Receivers may already be gone if every task has ended.
        let _ = self.shutdown_tx.send(true);

        let mut report = ShutdownReport::default();

        let graceful = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while let Some(result) = self.tasks.join_next().await {
                report.record(classify_task_result(result));
            }
        })
        .await;

        if graceful.is_err() {
            warn!(
                grace_secs = SHUTDOWN_GRACE.as_secs(),
                "Tasks did not stop in time, aborting"
            );
            self.tasks.abort_all();
            while let Some(result) = self.tasks.join_next().await {
                report.record(classify_task_result(result));
            }
        }

        if report.errors + report.panics > 0 {
            warn!(
                errors = report.errors,
                panics = report.panics,
                "Agent stopped with task failures"
            );
        } else {
            debug!(
                completed = report.completed,
                cancelled = report.cancelled,
                "All agent tasks stopped"
            );
        }

        info!("Agent stopped");
        Ok(())
    }
}

async fn handle_and_publish<A: RemoteAuthority>(
    pipeline: &IngestionPipeline<A>,
    events: &EventSink,
    raw: String,
) -> ScanOutcome {
    let outcome = pipeline.handle_scan(&raw).await;
    events
        .publish(AgentEvent::Scan {
            raw,
            outcome: outcome.clone(),
        })
        .await;
    outcome
}

/// Task termination classification for shutdown handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskTermination {
    Completed,
    Failed,
    Cancelled,
    Panicked,
}

fn classify_task_result(
    result: Result<AgentResult<()>, tokio::task::JoinError>,
) -> TaskTermination {
    match result {
        Ok(Ok(())) => TaskTermination::Completed,
        Ok(Err(e)) => {
            error!(error = %e, "Agent task failed");
            TaskTermination::Failed
        }
        Err(e) if e.is_cancelled() => TaskTermination::Cancelled,
        Err(e) => {
            error!(error = %e, "Agent task panicked");
            TaskTermination::Panicked
        }
    }
}

#[derive(Debug, Default)]
struct ShutdownReport {
    completed: usize,
    errors: usize,
    cancelled: usize,
    panics: usize,
}

impl ShutdownReport {
    fn record(&mut self, termination: TaskTermination) {
        match termination {
            TaskTermination::Completed => self.completed += 1,
            TaskTermination::Failed => self.errors += 1,
            TaskTermination::Cancelled => self.cancelled += 1,
            TaskTermination::Panicked => self.panics += 1,
        }
    }
}
