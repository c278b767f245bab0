//! Offline queue draining.
//!
//! A sync pass walks the queue oldest first and replays each scan with
//! source `RFIDO` and its original scan time. Records are handled one at a
//! time and independently:
//!
//! | Server answer         | Record              | Summary                   |
//! |-----------------------|---------------------|---------------------------|
//! | 201                   | deleted             | `succeeded`               |
//! | 201, `success: false` | kept, attempt noted | `failed`                  |
//! | 404                   | kept, attempt noted | `failed`, `unregistered`  |
//! | anything else / none  | kept, attempt noted | `failed`                  |
//!
//! A failure never ends the pass early. Only one pass runs at a time; a
//! second trigger while one is in flight gets [`AgentError::SyncInProgress`].

use chrono::Utc;
use clockin_network::{RemoteAuthority, ScanSubmission};
use clockin_storage::{PendingScan, PendingScanRepository, SqlitePendingScanRepository};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::error::{AgentError, AgentResult};
use crate::events::{AgentEvent, EventSink};
use crate::state::{ConnectivityState, Reachability};

/// Aggregated result of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Cards the server answered 404 for. Their records stay queued.
    pub unregistered: BTreeSet<String>,
}

impl SyncSummary {
    /// `true` when the pass found nothing to send.
    pub fn is_empty(&self) -> bool {
        self.attempted == 0
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "no pending scans");
        }

        write!(
            f,
            "{}/{} synced, {} failed",
            self.succeeded, self.attempted, self.failed
        )?;

        if !self.unregistered.is_empty() {
            let cards: Vec<&str> = self.unregistered.iter().map(String::as_str).collect();
            write!(f, ", unregistered: {}", cards.join(", "))?;
        }

        Ok(())
    }
}

/// Why the periodic path did not start a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AutoSyncDisabled,
    NotReachable(Reachability),
    IntervalNotElapsed { remaining: Duration },
    NothingPending,
}

/// Decide whether a periodic pass should run.
///
/// Runs only when auto-sync is on, the last probe succeeded, `interval` has
/// passed since the last pass (or there was none) and the queue is not
/// empty. Manual triggers bypass this entirely.
pub fn periodic_skip_reason(
    auto_sync: bool,
    reachability: Reachability,
    since_last_sync: Option<Duration>,
    interval: Duration,
    pending: i64,
) -> Option<SkipReason> {
    if !auto_sync {
        return Some(SkipReason::AutoSyncDisabled);
    }

    if reachability != Reachability::Reachable {
        return Some(SkipReason::NotReachable(reachability));
    }

    if let Some(elapsed) = since_last_sync
        && elapsed < interval
    {
        return Some(SkipReason::IntervalNotElapsed {
            remaining: interval - elapsed,
        });
    }

    if pending <= 0 {
        return Some(SkipReason::NothingPending);
    }

    None
}

/// Drains the offline queue against the attendance server.
pub struct SyncEngine<A, R = SqlitePendingScanRepository> {
    repo: R,
    authority: Arc<A>,
    pause: Duration,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the pass ends, however it ends.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<A: RemoteAuthority, R: PendingScanRepository> SyncEngine<A, R> {
    pub fn new(repo: R, authority: Arc<A>, pause: Duration) -> Self {
        Self {
            repo,
            authority,
            pause,
            in_flight: AtomicBool::new(false),
        }
    }

    /// `true` while a pass is running.
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn pending_count(&self) -> AgentResult<i64> {
        Ok(self.repo.count().await?)
    }

    /// Run one full pass.
    ///
    /// # Errors
    ///
    /// [`AgentError::SyncInProgress`] if another pass is running, or a
    /// storage error if the queue cannot be read. Per-record failures are
    /// counted in the summary, not returned.
    pub async fn sync_once(&self) -> AgentResult<SyncSummary> {
        let _guard = self.try_begin()?;
        self.drain(None).await
    }

    /// Like [`sync_once`](Self::sync_once), but stops between records once
    /// `shutdown` turns `true`. Records not reached stay queued.
    pub async fn sync_once_until(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> AgentResult<SyncSummary> {
        let _guard = self.try_begin()?;
        self.drain(Some(shutdown)).await
    }

    fn try_begin(&self) -> AgentResult<PassGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| PassGuard(&self.in_flight))
            .map_err(|_| AgentError::SyncInProgress)
    }

    async fn drain(
        &self,
        mut shutdown: Option<&mut watch::Receiver<bool>>,
    ) -> AgentResult<SyncSummary> {
        let pending = self.repo.list_pending().await?;
        let mut summary = SyncSummary::default();

        if pending.is_empty() {
            debug!("No pending scans to sync");
            return Ok(summary);
        }

        info!(pending = pending.len(), "Starting sync pass");

        for (index, scan) in pending.iter().enumerate() {
            if index > 0 && self.pause_interrupted(shutdown.as_deref_mut()).await {
                info!(
                    remaining = pending.len() - index,
                    "Sync pass interrupted by shutdown"
                );
                break;
            }

            self.sync_record(scan, &mut summary).await;
        }

        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            unregistered = summary.unregistered.len(),
            "Sync pass finished"
        );

        Ok(summary)
    }

    async fn sync_record(&self, scan: &PendingScan, summary: &mut SyncSummary) {
        let submission = ScanSubmission::offline(scan.card_number.clone(), scan.observed_at);
        summary.attempted += 1;

        trace!(id = scan.id, card = %scan.card_number, "Replaying queued scan");

        let accepted = match self.authority.submit(&submission).await {
            Ok(receipt) => {
                info!(id = scan.id, card = %scan.card_number, %receipt, "Queued scan synced");
                Ok(())
            }
            Err(e) if e.is_unconfirmed_acceptance() => {
                info!(
                    id = scan.id,
                    card = %scan.card_number,
                    error = %e,
                    "Queued scan synced without a readable receipt"
                );
                Ok(())
            }
            Err(e) => Err(e),
        };

        match accepted {
            Ok(()) => {
                summary.succeeded += 1;

                // The server has the scan; a failed delete only means it is
                // sent again on the next pass.
                if let Err(e) = self.repo.delete(scan.id).await {
                    error!(
                        id = scan.id,
                        card = %scan.card_number,
                        error = %e,
                        "Failed to remove synced scan from queue"
                    );
                }
            }
            Err(e) => {
                summary.failed += 1;

                if e.is_business_rejection() {
                    summary.unregistered.insert(scan.card_number.clone());
                    warn!(
                        id = scan.id,
                        card = %scan.card_number,
                        "Queued scan belongs to an unregistered card; kept"
                    );
                } else {
                    warn!(
                        id = scan.id,
                        card = %scan.card_number,
                        attempts = scan.sync_attempts + 1,
                        error = %e,
                        "Failed to sync queued scan"
                    );
                }

                if let Err(e) = self.repo.record_attempt(scan.id).await {
                    warn!(id = scan.id, error = %e, "Failed to record sync attempt");
                }
            }
        }
    }

    /// Sleep for the inter-record pause. Returns `true` if shutdown was
    /// requested meanwhile.
    async fn pause_interrupted(&self, shutdown: Option<&mut watch::Receiver<bool>>) -> bool {
        let Some(shutdown) = shutdown else {
            tokio::time::sleep(self.pause).await;
            return false;
        };

        if *shutdown.borrow() {
            return true;
        }

        tokio::select! {
            _ = tokio::time::sleep(self.pause) => false,
            changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
        }
    }
}

/// The automatic side of syncing: every tick, check the gate and run a pass
/// when it opens.
pub struct PeriodicSync<A> {
    engine: Arc<SyncEngine<A>>,
    state: ConnectivityState,
    auto_sync: Arc<AtomicBool>,
    events: EventSink,
    tick: Duration,
    interval: Duration,
}

impl<A: RemoteAuthority> PeriodicSync<A> {
    pub fn new(
        engine: Arc<SyncEngine<A>>,
        state: ConnectivityState,
        auto_sync: Arc<AtomicBool>,
        events: EventSink,
        tick: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            engine,
            state,
            auto_sync,
            events,
            tick,
            interval,
        }
    }

    /// Evaluate the gate once and run a pass if it is open.
    pub async fn tick_once(&self, shutdown: &mut watch::Receiver<bool>) -> Option<SyncSummary> {
        let pending = match self.engine.pending_count().await {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "Failed to count pending scans");
                return None;
            }
        };

        if let Some(reason) = periodic_skip_reason(
            self.auto_sync.load(Ordering::Acquire),
            self.state.reachability(),
            self.state.since_last_sync(Instant::now()),
            self.interval,
            pending,
        ) {
            trace!(?reason, "Periodic sync skipped");
            return None;
        }

        info!(pending, "Starting automatic sync");

        match self.engine.sync_once_until(shutdown).await {
            Ok(summary) => {
                self.state.record_sync(Utc::now(), Instant::now());
                self.events
                    .publish(AgentEvent::SyncCompleted(summary.clone()))
                    .await;
                Some(summary)
            }
            Err(AgentError::SyncInProgress) => {
                debug!("Sync already in progress, skipping automatic pass");
                None
            }
            Err(e) => {
                error!(error = %e, "Automatic sync failed");
                self.events
                    .publish(AgentEvent::SyncFailed {
                        error: e.to_string(),
                    })
                    .await;
                None
            }
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.interval.as_secs_f64(),
            "Automatic sync loop started"
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
                    self.tick_once(&mut shutdown).await;
                }
            }
        }

        info!("Automatic sync loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedAuthority, server_error, unknown_card};
    use chrono::{DateTime, TimeZone};
    use clockin_core::{CardNumber, EventSource};
    use clockin_network::AuthorityError;
    use clockin_storage::{Database, StorageError, StorageResult};
    use rstest::rstest;

    async fn setup_test_db() -> Database {
        Database::in_memory()
            .await
            .expect("Failed to create test database")
    }

    fn at(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 10, 12, 46, second).unwrap()
    }

    async fn enqueue(
        repo: &SqlitePendingScanRepository,
        card: &str,
        observed_at: DateTime<Utc>,
    ) -> i64 {
        repo.enqueue(&CardNumber::new(card).unwrap(), observed_at)
            .await
            .unwrap()
    }

    fn engine(
        db: &Database,
        authority: Arc<ScriptedAuthority>,
        pause: Duration,
    ) -> (SyncEngine<ScriptedAuthority>, SqlitePendingScanRepository) {
        let repo = SqlitePendingScanRepository::new(db.pool().clone());
        (SyncEngine::new(repo.clone(), authority, pause), repo)
    }

    #[tokio::test]
    async fn test_empty_queue_makes_no_calls() {
        let db = setup_test_db().await;
        let authority = Arc::new(ScriptedAuthority::accepting());
        let (engine, _) = engine(&db, authority.clone(), Duration::ZERO);

        let summary = engine.sync_once().await.unwrap();

        assert!(summary.is_empty());
        assert_eq!(summary, SyncSummary::default());
        assert_eq!(authority.submit_count(), 0);
    }

    #[tokio::test]
    async fn test_mixed_answers_are_handled_independently() {
        let db = setup_test_db().await;
        let authority = Arc::new(ScriptedAuthority::accepting());
        authority.respond("77777", Err(unknown_card("77777")));
        authority.respond("88888", Err(server_error(500)));
        let (engine, repo) = engine(&db, authority.clone(), Duration::ZERO);

        let delivered = enqueue(&repo, "12345", at(1)).await;
        let unknown = enqueue(&repo, "77777", at(2)).await;
        let broken = enqueue(&repo, "88888", at(3)).await;
        let last = enqueue(&repo, "99999", at(4)).await;

        let summary = engine.sync_once().await.unwrap();

        assert_eq!(summary.attempted, 4);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(
            summary.unregistered,
            BTreeSet::from(["77777".to_string()])
        );

        let remaining = repo.list_pending().await.unwrap();
        let ids: Vec<i64> = remaining.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![unknown, broken]);
        assert!(remaining.iter().all(|s| s.sync_attempts == 1));
        assert!(!ids.contains(&delivered) && !ids.contains(&last));
    }

    #[tokio::test]
    async fn test_unregistered_card_survives_for_next_pass() {
        let db = setup_test_db().await;
        let authority = Arc::new(ScriptedAuthority::accepting());
        authority.respond("77777", Err(unknown_card("77777")));
        let (engine, repo) = engine(&db, authority.clone(), Duration::ZERO);

        enqueue(&repo, "77777", at(1)).await;

        engine.sync_once().await.unwrap();
        let second = engine.sync_once().await.unwrap();

        assert_eq!(second.unregistered.len(), 1);
        let remaining = repo.list_pending().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].sync_attempts, 2);
    }

    #[tokio::test]
    async fn test_replays_oldest_first_with_original_time() {
        let db = setup_test_db().await;
        let authority = Arc::new(ScriptedAuthority::accepting());
        let (engine, repo) = engine(&db, authority.clone(), Duration::ZERO);

        enqueue(&repo, "33333", at(30)).await;
        enqueue(&repo, "11111", at(10)).await;
        enqueue(&repo, "22222", at(20)).await;

        engine.sync_once().await.unwrap();

        let submissions = authority.submissions();
        let cards: Vec<&str> = submissions
            .iter()
            .map(|s| s.card_number.as_str())
            .collect();
        assert_eq!(cards, vec!["11111", "22222", "33333"]);
        assert!(submissions.iter().all(|s| s.source == EventSource::Offline));
        assert_eq!(submissions[0].timestamp, "2025-05-10T12:46:10.000000Z");
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_every_record() {
        let db = setup_test_db().await;
        let authority = Arc::new(ScriptedAuthority::offline());
        let (engine, repo) = engine(&db, authority.clone(), Duration::ZERO);

        enqueue(&repo, "12345", at(1)).await;
        enqueue(&repo, "54321", at(2)).await;

        let summary = engine.sync_once().await.unwrap();

        assert_eq!(summary.failed, 2);
        assert!(summary.unregistered.is_empty());
        assert_eq!(authority.submit_count(), 2);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_created_reply_decides_deletion() {
        let db = setup_test_db().await;
        let authority = Arc::new(ScriptedAuthority::accepting());
        authority.respond(
            "12345",
            Err(AuthorityError::MalformedReply {
                status: 201,
                detail: "expected value".into(),
            }),
        );
        authority.respond(
            "54321",
            Err(AuthorityError::Refused {
                detail: "rejected".into(),
            }),
        );
        let (engine, repo) = engine(&db, authority.clone(), Duration::ZERO);

        enqueue(&repo, "12345", at(1)).await;
        let refused = enqueue(&repo, "54321", at(2)).await;

        let summary = engine.sync_once().await.unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        let remaining = repo.list_pending().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, refused);
        assert_eq!(remaining[0].sync_attempts, 1);
    }

    /// Queue whose deletes always fail.
    struct UndeletableQueue(SqlitePendingScanRepository);

    impl PendingScanRepository for UndeletableQueue {
        async fn enqueue(
            &self,
            card_number: &CardNumber,
            observed_at: DateTime<Utc>,
        ) -> StorageResult<i64> {
            self.0.enqueue(card_number, observed_at).await
        }

        async fn list_pending(&self) -> StorageResult<Vec<PendingScan>> {
            self.0.list_pending().await
        }

        async fn delete(&self, _id: i64) -> StorageResult<()> {
            Err(StorageError::Configuration("database is read-only".into()))
        }

        async fn record_attempt(&self, id: i64) -> StorageResult<()> {
            self.0.record_attempt(id).await
        }

        async fn count(&self) -> StorageResult<i64> {
            self.0.count().await
        }

        async fn clear_all(&self) -> StorageResult<u64> {
            self.0.clear_all().await
        }

        async fn find_by_card_number(&self, card_number: &str) -> StorageResult<Vec<PendingScan>> {
            self.0.find_by_card_number(card_number).await
        }
    }

    #[tokio::test]
    async fn test_failed_delete_counts_as_synced_and_is_resent() {
        let db = setup_test_db().await;
        let repo = SqlitePendingScanRepository::new(db.pool().clone());
        let authority = Arc::new(ScriptedAuthority::accepting());
        let engine = SyncEngine::new(
            UndeletableQueue(repo.clone()),
            authority.clone(),
            Duration::ZERO,
        );

        enqueue(&repo, "12345", at(1)).await;

        let first = engine.sync_once().await.unwrap();
        assert_eq!(first.succeeded, 1);
        assert_eq!(first.failed, 0);

        let remaining = repo.list_pending().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].sync_attempts, 0);

        let second = engine.sync_once().await.unwrap();
        assert_eq!(second.succeeded, 1);
        assert_eq!(authority.submit_count(), 2);
        assert!(!engine.is_syncing());
    }

    #[tokio::test]
    async fn test_pause_between_records_only() {
        let db = setup_test_db().await;
        let authority = Arc::new(ScriptedAuthority::accepting());
        let (engine, repo) = engine(&db, authority, Duration::from_millis(60));

        for second in 1..=3 {
            enqueue(&repo, &format!("1000{second}"), at(second)).await;
        }

        let started = std::time::Instant::now();
        engine.sync_once().await.unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(120), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(180 + 500), "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_concurrent_trigger_is_rejected() {
        let db = setup_test_db().await;
        let authority = Arc::new(ScriptedAuthority::accepting());
        authority.set_delay(Duration::from_millis(200));
        let (engine, repo) = engine(&db, authority.clone(), Duration::ZERO);
        let engine = Arc::new(engine);

        enqueue(&repo, "12345", at(1)).await;

        let first = tokio::spawn({
            let engine = engine.clone();
            async move { engine.sync_once().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(engine.is_syncing());
        assert!(matches!(
            engine.sync_once().await,
            Err(AgentError::SyncInProgress)
        ));

        let summary = first.await.unwrap().unwrap();
        assert_eq!(summary.succeeded, 1);
        assert!(!engine.is_syncing());
        assert_eq!(authority.submit_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_between_records() {
        let db = setup_test_db().await;
        let authority = Arc::new(ScriptedAuthority::accepting());
        let (engine, repo) = engine(&db, authority.clone(), Duration::from_secs(5));

        enqueue(&repo, "12345", at(1)).await;
        enqueue(&repo, "54321", at(2)).await;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let pass = tokio::spawn({
            let engine = Arc::new(engine);
            async move { engine.sync_once_until(&mut shutdown_rx).await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();

        let summary = tokio::time::timeout(Duration::from_secs(1), pass)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert_eq!(summary.attempted, 1);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[test]
    fn test_summary_display() {
        let summary = SyncSummary {
            attempted: 3,
            succeeded: 1,
            failed: 2,
            unregistered: BTreeSet::from(["77777".to_string()]),
        };
        assert_eq!(
            summary.to_string(),
            "1/3 synced, 2 failed, unregistered: 77777"
        );
        assert_eq!(SyncSummary::default().to_string(), "no pending scans");
    }

    const MINUTE: Duration = Duration::from_secs(60);

    #[rstest]
    #[case::all_clear(true, Reachability::Reachable, None, 3, None)]
    #[case::interval_elapsed(true, Reachability::Reachable, Some(MINUTE), 1, None)]
    #[case::disabled(false, Reachability::Reachable, None, 3, Some(SkipReason::AutoSyncDisabled))]
    #[case::offline(
        true,
        Reachability::Unreachable,
        None,
        3,
        Some(SkipReason::NotReachable(Reachability::Unreachable))
    )]
    #[case::not_probed_yet(
        true,
        Reachability::Unknown,
        None,
        3,
        Some(SkipReason::NotReachable(Reachability::Unknown))
    )]
    #[case::too_soon(
        true,
        Reachability::Reachable,
        Some(Duration::from_secs(45)),
        3,
        Some(SkipReason::IntervalNotElapsed { remaining: Duration::from_secs(15) })
    )]
    #[case::empty(true, Reachability::Reachable, None, 0, Some(SkipReason::NothingPending))]
    fn test_periodic_gate(
        #[case] auto_sync: bool,
        #[case] reachability: Reachability,
        #[case] since_last_sync: Option<Duration>,
        #[case] pending: i64,
        #[case] expected: Option<SkipReason>,
    ) {
        assert_eq!(
            periodic_skip_reason(auto_sync, reachability, since_last_sync, MINUTE, pending),
            expected
        );
    }

    fn periodic(
        engine: SyncEngine<ScriptedAuthority>,
        state: &ConnectivityState,
        auto_sync: bool,
    ) -> (PeriodicSync<ScriptedAuthority>, tokio::sync::mpsc::Receiver<AgentEvent>) {
        let (events, rx) = EventSink::channel(16);
        (
            PeriodicSync::new(
                Arc::new(engine),
                state.clone(),
                Arc::new(AtomicBool::new(auto_sync)),
                events,
                Duration::from_millis(10),
                MINUTE,
            ),
            rx,
        )
    }

    #[tokio::test]
    async fn test_periodic_tick_runs_when_gate_open() {
        let db = setup_test_db().await;
        let authority = Arc::new(ScriptedAuthority::accepting());
        let (engine, repo) = engine(&db, authority.clone(), Duration::ZERO);
        enqueue(&repo, "12345", at(1)).await;

        let state = ConnectivityState::new();
        state.record_probe(true, Utc::now());
        let (periodic, mut rx) = periodic(engine, &state, true);
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let summary = periodic.tick_once(&mut shutdown_rx).await.unwrap();
        assert_eq!(summary.succeeded, 1);
        assert!(state.snapshot().last_synced_at.is_some());
        assert!(matches!(
            rx.try_recv().unwrap(),
            AgentEvent::SyncCompleted(s) if s.succeeded == 1
        ));

        // Interval restarts after a pass, even with new work queued.
        enqueue(&repo, "54321", at(2)).await;
        assert!(periodic.tick_once(&mut shutdown_rx).await.is_none());
        assert_eq!(authority.submit_count(), 1);
    }

    #[tokio::test]
    async fn test_periodic_tick_respects_auto_sync_flag() {
        let db = setup_test_db().await;
        let authority = Arc::new(ScriptedAuthority::accepting());
        let (engine, repo) = engine(&db, authority.clone(), Duration::ZERO);
        enqueue(&repo, "12345", at(1)).await;

        let state = ConnectivityState::new();
        state.record_probe(true, Utc::now());
        let (periodic, _rx) = periodic(engine, &state, false);
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);

        assert!(periodic.tick_once(&mut shutdown_rx).await.is_none());
        assert_eq!(authority.submit_count(), 0);
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
