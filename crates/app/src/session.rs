use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use talent_sync_core::{
    CandidateStatus, CandidateStore, InsightsAggregate, InsightsSnapshot, MatchKey, MatchRecord,
    SelectionSet, ShortlistBasis, StatusPatch,
};

use crate::events::{ViewEvent, ViewEventKind, ViewHub};

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// What the dashboard should show while data is (or is not) available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewStatus {
    Loading,
    Ready,
    NoData,
}

/// Position of a refresh in the session's write order, taken when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshTicket(u64);

impl RefreshTicket {
    pub fn seq(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ApplyOutcome {
    Applied { pruned_selection: usize },
    /// A newer refresh or a confirmed local patch landed after this refresh started.
    Stale,
    Closed,
}

/// Result of applying a confirmed mutation to the local view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocalChange {
    pub seq: u64,
    pub rows_patched: usize,
    pub shortlist_delta: i64,
    pub shortlisted_count: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionUpdate {
    Changed,
    Unchanged,
    UnknownRow,
    Closed,
}

/// Consistent read of the whole view, taken under one lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSnapshot {
    pub status: ViewStatus,
    pub candidates: Vec<MatchRecord>,
    pub insights: Option<InsightsSnapshot>,
    pub selection: Vec<MatchKey>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub version: u64,
}

struct SessionState {
    candidates: CandidateStore,
    insights: InsightsAggregate,
    selection: SelectionSet,
    status: ViewStatus,
    last_write: u64,
    last_refreshed_at: Option<DateTime<Utc>>,
    closed: bool,
}

struct SessionInner {
    state: RwLock<SessionState>,
    sequence: AtomicU64,
    events: ViewHub,
    shutdown: watch::Sender<bool>,
    clock: Clock,
}

/// Dashboard session context owning the candidate view, insights and selection.
///
/// Refreshes and confirmed mutations are ordered by a single monotonic
/// sequence: a snapshot is only applied when its refresh started after the
/// last applied write, so stale fetches can never overwrite newer state.
#[derive(Clone)]
pub struct SyncSession {
    inner: Arc<SessionInner>,
}

impl SyncSession {
    pub fn new(clock: Clock) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(SessionInner {
                state: RwLock::new(SessionState {
                    candidates: CandidateStore::new(),
                    insights: InsightsAggregate::new(),
                    selection: SelectionSet::new(),
                    status: ViewStatus::Loading,
                    last_write: 0,
                    last_refreshed_at: None,
                    closed: false,
                }),
                sequence: AtomicU64::new(0),
                events: ViewHub::new(),
                shutdown,
                clock,
            }),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.inner.clock)()
    }

    pub fn events(&self) -> &ViewHub {
        &self.inner.events
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    /// Closes the session. Results arriving afterwards are discarded.
    pub async fn teardown(&self) {
        let mut state = self.inner.state.write().await;
        if state.closed {
            return;
        }
        state.closed = true;
        drop(state);
        self.inner.shutdown.send_replace(true);
        info!(stage = "sync", "session torn down");
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.state.read().await.closed
    }

    pub fn begin_refresh(&self) -> RefreshTicket {
        RefreshTicket(self.next_seq())
    }

    /// Replaces candidates and insights together if `ticket` is still current.
    pub async fn apply_snapshot(
        &self,
        ticket: RefreshTicket,
        records: Vec<MatchRecord>,
        insights: InsightsSnapshot,
    ) -> ApplyOutcome {
        let mut state = self.inner.state.write().await;
        if state.closed {
            return ApplyOutcome::Closed;
        }
        if ticket.seq() <= state.last_write {
            counter!("sync_stale_discarded_total").increment(1);
            debug!(
                stage = "sync",
                ticket = ticket.seq(),
                last_write = state.last_write,
                "discarding stale snapshot"
            );
            return ApplyOutcome::Stale;
        }

        state.candidates.replace(records);
        state.insights.replace(insights);
        let out_of_range = state.candidates.out_of_range_rows();
        if out_of_range > 0 {
            warn!(
                stage = "sync",
                rows = out_of_range,
                "snapshot contains scores outside [0, 1]"
            );
        }
        let pruned_selection = {
            let SessionState {
                candidates,
                selection,
                ..
            } = &mut *state;
            selection.retain_present(candidates)
        };
        state.status = ViewStatus::Ready;
        state.last_write = ticket.seq();
        state.last_refreshed_at = Some(self.now());
        record_view_gauges(&state);

        let detail = json!({
            "rows": state.candidates.len(),
            "shortlisted": state.insights.shortlisted_count(),
            "pruned_selection": pruned_selection,
        });
        drop(state);

        self.publish(ViewEventKind::CandidatesReplaced, ticket.seq(), detail);
        if pruned_selection > 0 {
            self.publish(
                ViewEventKind::SelectionChanged,
                ticket.seq(),
                json!({ "pruned": pruned_selection }),
            );
        }

        ApplyOutcome::Applied { pruned_selection }
    }

    /// Records a failed refresh; the previous view is kept as is.
    pub async fn record_refresh_failure(&self, ticket: RefreshTicket, reason: &str) -> ViewStatus {
        let mut state = self.inner.state.write().await;
        if state.closed {
            return state.status;
        }
        if !state.insights.has_snapshot() {
            state.status = ViewStatus::NoData;
        }
        let status = state.status;
        drop(state);

        self.publish(
            ViewEventKind::RefreshFailed,
            ticket.seq(),
            json!({ "reason": reason, "status": status }),
        );
        status
    }

    /// Applies a status change the service has already accepted.
    ///
    /// Returns `None` when the session was torn down in the meantime.
    pub async fn apply_confirmed_status(
        &self,
        candidate_id: u64,
        status: CandidateStatus,
        basis: ShortlistBasis,
    ) -> Option<LocalChange> {
        let mut state = self.inner.state.write().await;
        if state.closed {
            return None;
        }

        let outcome = state
            .candidates
            .patch_candidate(candidate_id, &StatusPatch::new(status));
        let delta = outcome.shortlist_delta(basis);
        let shortlisted_count = if delta != 0 {
            state.insights.adjust_shortlist_count(delta)
        } else {
            state.insights.shortlisted_count()
        };
        let seq = self.next_seq();
        state.last_write = seq;
        record_view_gauges(&state);
        drop(state);

        let change = LocalChange {
            seq,
            rows_patched: outcome.rows_patched,
            shortlist_delta: delta,
            shortlisted_count,
        };
        self.publish(
            ViewEventKind::CandidatesPatched,
            seq,
            json!({
                "candidate_ids": [candidate_id],
                "status": status,
                "rows": change.rows_patched,
                "shortlist_delta": delta,
            }),
        );
        Some(change)
    }

    /// Marks every candidate of `sent` as shortlisted after the service accepted
    /// the bulk request, then removes the sent rows from the selection.
    pub async fn apply_confirmed_shortlist(
        &self,
        sent: &SelectionSet,
        basis: ShortlistBasis,
    ) -> Option<LocalChange> {
        let mut state = self.inner.state.write().await;
        if state.closed {
            return None;
        }

        let patch = StatusPatch::new(CandidateStatus::Shortlisted);
        let candidate_ids: BTreeSet<u64> = sent.candidate_ids();
        let mut rows_patched = 0;
        let mut delta = 0;
        for candidate_id in &candidate_ids {
            let outcome = state.candidates.patch_candidate(*candidate_id, &patch);
            rows_patched += outcome.rows_patched;
            delta += outcome.shortlist_delta(basis);
        }
        let shortlisted_count = if delta != 0 {
            state.insights.adjust_shortlist_count(delta)
        } else {
            state.insights.shortlisted_count()
        };
        for key in sent.keys() {
            state.selection.set(*key, false);
        }
        let seq = self.next_seq();
        state.last_write = seq;
        record_view_gauges(&state);
        let remaining = state.selection.len();
        drop(state);

        self.publish(
            ViewEventKind::CandidatesPatched,
            seq,
            json!({
                "candidate_ids": candidate_ids,
                "status": CandidateStatus::Shortlisted,
                "rows": rows_patched,
                "shortlist_delta": delta,
            }),
        );
        self.publish(
            ViewEventKind::SelectionChanged,
            seq,
            json!({ "selected": remaining }),
        );

        Some(LocalChange {
            seq,
            rows_patched,
            shortlist_delta: delta,
            shortlisted_count,
        })
    }

    /// Selects or deselects one row. Only rows currently in the view can be selected.
    pub async fn set_selected(&self, key: MatchKey, selected: bool) -> SelectionUpdate {
        let mut state = self.inner.state.write().await;
        if state.closed {
            return SelectionUpdate::Closed;
        }
        if selected && !state.candidates.keys().contains(&key) {
            return SelectionUpdate::UnknownRow;
        }
        if !state.selection.set(key, selected) {
            return SelectionUpdate::Unchanged;
        }
        let remaining = state.selection.len();
        drop(state);

        self.publish(
            ViewEventKind::SelectionChanged,
            self.current_seq(),
            json!({ "selected": remaining }),
        );
        SelectionUpdate::Changed
    }

    pub async fn clear_selection(&self) {
        let mut state = self.inner.state.write().await;
        if state.closed || state.selection.is_empty() {
            return;
        }
        state.selection.clear();
        drop(state);

        self.publish(
            ViewEventKind::SelectionChanged,
            self.current_seq(),
            json!({ "selected": 0 }),
        );
    }

    pub async fn selection(&self) -> SelectionSet {
        self.inner.state.read().await.selection.clone()
    }

    pub async fn candidates(&self) -> Vec<MatchRecord> {
        self.inner.state.read().await.candidates.all().to_vec()
    }

    pub async fn insights(&self) -> Option<InsightsSnapshot> {
        self.inner.state.read().await.insights.snapshot().cloned()
    }

    pub async fn view(&self) -> ViewSnapshot {
        let state = self.inner.state.read().await;
        ViewSnapshot {
            status: state.status,
            candidates: state.candidates.all().to_vec(),
            insights: state.insights.snapshot().cloned(),
            selection: state.selection.keys().copied().collect(),
            last_refreshed_at: state.last_refreshed_at,
            version: state.last_write,
        }
    }

    fn next_seq(&self) -> u64 {
        self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn current_seq(&self) -> u64 {
        self.inner.sequence.load(Ordering::SeqCst)
    }

    fn publish(&self, kind: ViewEventKind, seq: u64, detail: serde_json::Value) {
        self.inner.events.publish(ViewEvent {
            ts: self.now(),
            kind,
            seq,
            detail,
        });
    }
}

fn record_view_gauges(state: &SessionState) {
    gauge!("view_candidates").set(state.candidates.len() as f64);
    if let Some(count) = state.insights.shortlisted_count() {
        gauge!("view_shortlisted").set(count as f64);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::TimeZone;

    pub fn fixed_clock() -> Clock {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Arc::new(move || now)
    }

    pub fn record(id: u64, jd_id: u64, status: CandidateStatus) -> MatchRecord {
        MatchRecord {
            id,
            name: format!("Candidate {id}"),
            email: Some(format!("candidate{id}@example.com")),
            phone: None,
            overall_score: 0.62,
            skills_match_score: 0.7,
            experience_match_score: 0.5,
            matched_skills: vec!["Python".to_string()],
            missing_skills: Vec::new(),
            skill_gaps: Vec::new(),
            experience_years: Some(3),
            education: Some("Bachelor".to_string()),
            gender: Some("female".to_string()),
            status,
            is_shortlisted: status.is_shortlisted(),
            jd_id,
            jd_title: format!("Role {jd_id}"),
            created_at: None,
        }
    }

    /// Ten single-row candidates, the first two shortlisted.
    pub fn population() -> Vec<MatchRecord> {
        (1..=10)
            .map(|id| {
                let status = if id <= 2 {
                    CandidateStatus::Shortlisted
                } else {
                    CandidateStatus::Pending
                };
                record(id, 1, status)
            })
            .collect()
    }

    pub fn insights(total: u64, shortlisted: u64) -> InsightsSnapshot {
        InsightsSnapshot {
            shortlisted_candidates: shortlisted,
            average_score: 0.62,
            ..InsightsSnapshot::empty(total)
        }
    }

    pub async fn seeded_session() -> SyncSession {
        let session = SyncSession::new(fixed_clock());
        let ticket = session.begin_refresh();
        let outcome = session
            .apply_snapshot(ticket, population(), insights(10, 2))
            .await;
        assert!(matches!(outcome, ApplyOutcome::Applied { .. }));
        session
    }
}
