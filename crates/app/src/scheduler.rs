use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::Serialize;
use tokio::{
    sync::{mpsc, watch},
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use talent_sync_client::{ClientError, RecruitingClient};

use crate::session::{ApplyOutcome, SyncSession};

const COMMAND_CAPACITY: usize = 8;

/// Why a refresh was requested outside the periodic tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    Manual,
    Reconcile,
}

impl RefreshReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Reconcile => "reconcile",
        }
    }
}

#[derive(Debug)]
struct RefreshCommand {
    reason: RefreshReason,
}

/// Handle used to refresh the session from the recruiting service.
#[derive(Clone)]
pub struct SyncScheduler {
    session: SyncSession,
    client: RecruitingClient,
    sender: mpsc::Sender<RefreshCommand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RefreshReport {
    pub ticket: u64,
    #[serde(flatten)]
    pub outcome: ApplyOutcome,
    pub rows: usize,
    pub shortlisted: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("candidate fetch failed: {0}")]
    Candidates(#[source] ClientError),
    #[error("insights fetch failed: {0}")]
    Insights(#[source] ClientError),
    #[error("insights service degraded: {0}")]
    Degraded(String),
    #[error("session closed")]
    SessionClosed,
}

impl RefreshError {
    fn label(&self) -> &'static str {
        match self {
            Self::Candidates(_) => "candidates",
            Self::Insights(_) => "insights",
            Self::Degraded(_) => "degraded",
            Self::SessionClosed => "closed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshTriggerError {
    #[error("refresh worker channel closed")]
    ChannelClosed,
}

impl SyncScheduler {
    pub fn new(
        session: SyncSession,
        client: RecruitingClient,
        interval: Duration,
    ) -> (Self, SyncWorker) {
        let (sender, receiver) = mpsc::channel(COMMAND_CAPACITY);
        let shutdown = session.shutdown_signal();
        let scheduler = Self {
            session,
            client,
            sender,
        };
        let worker = SyncWorker {
            scheduler: scheduler.clone(),
            receiver,
            interval,
            shutdown,
        };
        (scheduler, worker)
    }

    /// Fetches candidates and insights together and replaces both when both succeed.
    pub async fn refresh_now(&self) -> Result<RefreshReport, RefreshError> {
        if self.session.is_closed().await {
            return Err(RefreshError::SessionClosed);
        }

        let started = Instant::now();
        let ticket = self.session.begin_refresh();
        let (candidates, insights) = tokio::join!(
            self.client.list_candidates(None),
            self.client.fetch_insights(None)
        );
        histogram!("sync_refresh_seconds").record(started.elapsed().as_secs_f64());

        let fetched = match (candidates, insights) {
            (Err(err), _) => Err(RefreshError::Candidates(err)),
            (_, Err(err)) => Err(RefreshError::Insights(err)),
            (Ok(_), Ok(snapshot)) if snapshot.error.is_some() => Err(RefreshError::Degraded(
                snapshot.error.unwrap_or_default(),
            )),
            (Ok(records), Ok(snapshot)) => Ok((records, snapshot)),
        };

        let (records, snapshot) = match fetched {
            Ok(pair) => pair,
            Err(err) => {
                counter!("sync_refresh_total", "result" => "failure").increment(1);
                let status = self
                    .session
                    .record_refresh_failure(ticket, &err.to_string())
                    .await;
                warn!(
                    stage = "refresh",
                    ticket = ticket.seq(),
                    cause = err.label(),
                    view_status = ?status,
                    error = %err,
                    "refresh failed; keeping previous view"
                );
                return Err(err);
            }
        };

        let rows = records.len();
        let shortlisted = snapshot.shortlisted_candidates;
        let outcome = self.session.apply_snapshot(ticket, records, snapshot).await;
        let result = match outcome {
            ApplyOutcome::Applied { .. } => "applied",
            ApplyOutcome::Stale => "stale",
            ApplyOutcome::Closed => "closed",
        };
        counter!("sync_refresh_total", "result" => result).increment(1);
        debug!(
            stage = "refresh",
            ticket = ticket.seq(),
            rows,
            shortlisted,
            result,
            "refresh completed"
        );

        Ok(RefreshReport {
            ticket: ticket.seq(),
            outcome,
            rows,
            shortlisted,
        })
    }

    /// Queues a refresh on the worker. A full queue already guarantees a pending refresh.
    pub fn request_refresh(&self, reason: RefreshReason) -> Result<(), RefreshTriggerError> {
        match self.sender.try_send(RefreshCommand { reason }) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(
                    stage = "refresh",
                    reason = reason.as_str(),
                    "refresh already queued"
                );
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(RefreshTriggerError::ChannelClosed),
        }
    }
}

pub struct SyncWorker {
    scheduler: SyncScheduler,
    receiver: mpsc::Receiver<RefreshCommand>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl SyncWorker {
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(mut self) {
        if *self.shutdown.borrow() {
            return;
        }

        // The first tick completes immediately and performs the initial fetch.
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            stage = "refresh",
            interval_secs = self.interval.as_secs(),
            "sync worker started"
        );

        loop {
            tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.refresh("interval").await;
                }
                Some(cmd) = self.receiver.recv() => {
                    self.refresh(cmd.reason.as_str()).await;
                }
                else => break,
            }
        }

        info!(stage = "refresh", "sync worker stopped");
    }

    async fn refresh(&self, trigger: &'static str) {
        match self.scheduler.refresh_now().await {
            Ok(report) => {
                debug!(stage = "refresh", trigger, ticket = report.ticket, "refresh run finished");
            }
            Err(RefreshError::SessionClosed) => {}
            Err(err) => {
                error!(stage = "refresh", trigger, error = %err, "refresh run failed");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_requests(&mut self) -> usize {
        let mut count = 0;
        while self.receiver.try_recv().is_ok() {
            count += 1;
        }
        count
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{client, unreachable_client};
    use super::*;
    use crate::session::{test_support::*, ViewStatus};
    use httpmock::prelude::*;
    use serde_json::json;
    use talent_sync_core::CandidateStatus;

    fn scheduler_for(server: &MockServer, session: SyncSession) -> (SyncScheduler, SyncWorker) {
        SyncScheduler::new(session, client(server), Duration::from_secs(30))
    }

    #[tokio::test]
    async fn refresh_replaces_candidates_and_insights() {
        let server = MockServer::start_async().await;
        let candidates = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/dashboard/candidates");
                then.status(200)
                    .json_body(serde_json::to_value(population()).expect("json"));
            })
            .await;
        let insights_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/dashboard/insights");
                then.status(200)
                    .json_body(serde_json::to_value(insights(10, 2)).expect("json"));
            })
            .await;

        let session = SyncSession::new(fixed_clock());
        let (scheduler, _worker) = scheduler_for(&server, session.clone());
        let report = scheduler.refresh_now().await.expect("refresh");

        candidates.assert_async().await;
        insights_mock.assert_async().await;
        assert_eq!(report.rows, 10);
        assert_eq!(report.shortlisted, 2);
        assert!(matches!(report.outcome, ApplyOutcome::Applied { .. }));

        let view = session.view().await;
        assert_eq!(view.status, ViewStatus::Ready);
        assert_eq!(view.candidates, population());
        assert_eq!(view.insights, Some(insights(10, 2)));
    }

    #[tokio::test]
    async fn failed_insights_keeps_previous_view() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/dashboard/candidates");
                then.status(200).json_body(json!([]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/dashboard/insights");
                then.status(500).body("boom");
            })
            .await;

        let session = seeded_session().await;
        let before = session.view().await;
        let (scheduler, _worker) = scheduler_for(&server, session.clone());

        let err = scheduler.refresh_now().await.expect_err("should fail");
        assert!(matches!(err, RefreshError::Insights(ClientError::Status { .. })));
        assert_eq!(session.view().await, before);
    }

    #[tokio::test]
    async fn first_failure_reports_no_data() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/dashboard/candidates");
                then.status(200).body("not json");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/dashboard/insights");
                then.status(200)
                    .json_body(serde_json::to_value(insights(0, 0)).expect("json"));
            })
            .await;

        let session = SyncSession::new(fixed_clock());
        let (scheduler, _worker) = scheduler_for(&server, session.clone());

        let err = scheduler.refresh_now().await.expect_err("should fail");
        assert!(matches!(err, RefreshError::Candidates(ClientError::Decode(_))));
        assert_eq!(session.view().await.status, ViewStatus::NoData);
        assert!(session.candidates().await.is_empty());
    }

    #[tokio::test]
    async fn degraded_insights_counts_as_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/dashboard/candidates");
                then.status(200).json_body(json!([]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/dashboard/insights");
                then.status(200).json_body(json!({
                    "total_candidates": 0,
                    "shortlisted_candidates": 0,
                    "average_score": 0,
                    "bias_alerts": [],
                    "diversity_metrics": {},
                    "risk_heatmap": {"status": "error"},
                    "diversity_score": 0,
                    "sentiment_data": {},
                    "error": "database unavailable"
                }));
            })
            .await;

        let session = seeded_session().await;
        let before = session.view().await;
        let (scheduler, _worker) = scheduler_for(&server, session.clone());

        let err = scheduler.refresh_now().await.expect_err("degraded");
        assert!(matches!(err, RefreshError::Degraded(message) if message == "database unavailable"));
        assert_eq!(session.view().await, before);
    }

    #[tokio::test]
    async fn transport_failure_keeps_previous_view() {
        let session = seeded_session().await;
        let before = session.view().await;
        let (scheduler, _worker) =
            SyncScheduler::new(session.clone(), unreachable_client(), Duration::from_secs(30));

        let err = scheduler.refresh_now().await.expect_err("connection refused");
        assert!(matches!(err, RefreshError::Candidates(ClientError::Http(_))));
        assert_eq!(session.view().await, before);
    }

    #[tokio::test]
    async fn refresh_after_teardown_is_refused() {
        let server = MockServer::start_async().await;
        let session = seeded_session().await;
        let (scheduler, _worker) = scheduler_for(&server, session.clone());

        session.teardown().await;
        assert!(matches!(
            scheduler.refresh_now().await,
            Err(RefreshError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn requests_are_queued_and_coalesced() {
        let server = MockServer::start_async().await;
        let session = SyncSession::new(fixed_clock());
        let (scheduler, mut worker) = scheduler_for(&server, session);

        for _ in 0..(COMMAND_CAPACITY + 3) {
            scheduler
                .request_refresh(RefreshReason::Manual)
                .expect("queue open");
        }
        assert_eq!(worker.pending_requests(), COMMAND_CAPACITY);
    }

    #[tokio::test]
    async fn request_after_worker_dropped_reports_closed_channel() {
        let server = MockServer::start_async().await;
        let session = SyncSession::new(fixed_clock());
        let (scheduler, worker) = scheduler_for(&server, session);
        drop(worker);

        assert!(matches!(
            scheduler.request_refresh(RefreshReason::Reconcile),
            Err(RefreshTriggerError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn worker_fetches_immediately_and_stops_on_teardown() {
        let server = MockServer::start_async().await;
        let mut rows = population();
        rows[4].status = CandidateStatus::Accepted;
        let body = serde_json::to_value(&rows).expect("json");
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/dashboard/candidates");
                then.status(200).json_body(body);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/dashboard/insights");
                then.status(200)
                    .json_body(serde_json::to_value(insights(10, 2)).expect("json"));
            })
            .await;

        let session = SyncSession::new(fixed_clock());
        let mut events = session.events().subscribe();
        let (_scheduler, worker) = scheduler_for(&server, session.clone());
        let handle = worker.spawn();

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("initial refresh in time")
            .expect("event");
        assert_eq!(event.kind, crate::events::ViewEventKind::CandidatesReplaced);
        assert_eq!(session.candidates().await, rows);

        session.teardown().await;
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker stops")
            .expect("worker task");
    }

    #[tokio::test]
    async fn worker_keeps_refreshing_on_interval() {
        let server = MockServer::start_async().await;
        let candidates = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/dashboard/candidates");
                then.status(200)
                    .json_body(serde_json::to_value(population()).expect("json"));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/dashboard/insights");
                then.status(200)
                    .json_body(serde_json::to_value(insights(10, 2)).expect("json"));
            })
            .await;

        let session = SyncSession::new(fixed_clock());
        let (_scheduler, worker) =
            SyncScheduler::new(session.clone(), client(&server), Duration::from_millis(100));
        let handle = worker.spawn();

        // The initial fetch plus at least two interval ticks.
        tokio::time::timeout(Duration::from_secs(5), async {
            while candidates.hits_async().await < 3 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("interval kept firing");

        session.teardown().await;
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker stops")
            .expect("worker task");
    }
}
