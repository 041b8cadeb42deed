use metrics::counter;
use serde::Serialize;
use tracing::{info, warn};

use talent_sync_client::{ClientError, RecruitingClient, ShortlistRequest};
use talent_sync_core::{CandidateStatus, ShortlistBasis};

use crate::scheduler::{RefreshReason, SyncScheduler};
use crate::session::{LocalChange, SyncSession};

/// Runs confirmed mutations: remote call first, local patch only on success,
/// then a reconciling refresh.
#[derive(Clone)]
pub struct MutationCoordinator {
    session: SyncSession,
    client: RecruitingClient,
    scheduler: SyncScheduler,
    basis: ShortlistBasis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub candidate_id: u64,
    pub status: CandidateStatus,
    #[serde(flatten)]
    pub change: LocalChange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkShortlist {
    pub requests: usize,
    pub candidate_ids: Vec<u64>,
    pub notifications: u64,
    #[serde(flatten)]
    pub change: LocalChange,
}

#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error("recruiting service rejected the change: {0}")]
    Remote(#[from] ClientError),
    #[error("shortlist for job description {jd_id} failed after {accepted_groups} accepted request(s): {source}")]
    Shortlist {
        jd_id: u64,
        accepted_groups: usize,
        #[source]
        source: ClientError,
    },
    #[error("no candidates selected")]
    EmptySelection,
    #[error("session closed")]
    SessionClosed,
}

impl MutationCoordinator {
    pub fn new(
        session: SyncSession,
        client: RecruitingClient,
        scheduler: SyncScheduler,
        basis: ShortlistBasis,
    ) -> Self {
        Self {
            session,
            client,
            scheduler,
            basis,
        }
    }

    /// Changes the status of every match row of `candidate_id`.
    pub async fn change_status(
        &self,
        candidate_id: u64,
        status: CandidateStatus,
    ) -> Result<StatusChange, MutationError> {
        if self.session.is_closed().await {
            return Err(MutationError::SessionClosed);
        }

        if let Err(err) = self.client.update_status(candidate_id, status).await {
            counter!("sync_mutation_total", "kind" => "status", "result" => "failure").increment(1);
            warn!(
                stage = "mutation",
                candidate_id,
                status = status.as_str(),
                cause = err.kind(),
                error = %err,
                "status change rejected"
            );
            return Err(MutationError::Remote(err));
        }

        let Some(change) = self
            .session
            .apply_confirmed_status(candidate_id, status, self.basis)
            .await
        else {
            return Err(MutationError::SessionClosed);
        };
        counter!("sync_mutation_total", "kind" => "status", "result" => "success").increment(1);
        info!(
            stage = "mutation",
            candidate_id,
            status = status.as_str(),
            rows = change.rows_patched,
            shortlist_delta = change.shortlist_delta,
            "status change applied"
        );
        self.reconcile();

        Ok(StatusChange {
            candidate_id,
            status,
            change,
        })
    }

    /// Shortlists the current selection, one request per job description.
    ///
    /// Local state is only patched when every request was accepted; otherwise
    /// the selection is kept so the operator can retry.
    pub async fn shortlist_selected(&self) -> Result<BulkShortlist, MutationError> {
        if self.session.is_closed().await {
            return Err(MutationError::SessionClosed);
        }

        let selection = self.session.selection().await;
        if selection.is_empty() {
            return Err(MutationError::EmptySelection);
        }

        let groups = selection.group_by_jd();
        let mut accepted_groups = 0;
        let mut notifications = 0;
        for (jd_id, candidate_ids) in groups {
            let request = ShortlistRequest {
                candidate_ids,
                jd_id,
            };
            match self.client.shortlist(&request).await {
                Ok(receipt) => {
                    accepted_groups += 1;
                    notifications += receipt.email_notifications;
                }
                Err(source) => {
                    counter!("sync_mutation_total", "kind" => "shortlist", "result" => "failure")
                        .increment(1);
                    warn!(
                        stage = "mutation",
                        jd_id,
                        accepted_groups,
                        cause = source.kind(),
                        error = %source,
                        "bulk shortlist rejected"
                    );
                    // Earlier groups may already be shortlisted remotely.
                    if accepted_groups > 0 {
                        self.reconcile();
                    }
                    return Err(MutationError::Shortlist {
                        jd_id,
                        accepted_groups,
                        source,
                    });
                }
            }
        }

        let Some(change) = self
            .session
            .apply_confirmed_shortlist(&selection, self.basis)
            .await
        else {
            return Err(MutationError::SessionClosed);
        };
        counter!("sync_mutation_total", "kind" => "shortlist", "result" => "success").increment(1);
        info!(
            stage = "mutation",
            requests = accepted_groups,
            rows = change.rows_patched,
            shortlist_delta = change.shortlist_delta,
            "bulk shortlist applied"
        );
        self.reconcile();

        Ok(BulkShortlist {
            requests: accepted_groups,
            candidate_ids: selection.candidate_ids().into_iter().collect(),
            notifications,
            change,
        })
    }

    fn reconcile(&self) {
        if let Err(err) = self.scheduler.request_refresh(RefreshReason::Reconcile) {
            warn!(stage = "mutation", error = %err, "reconciling refresh not queued");
        }
    }
}
