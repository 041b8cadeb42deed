use std::collections::HashSet;

use crate::types::{CandidateStatus, MatchKey, MatchRecord, ShortlistBasis, StatusPatch};

/// Ordered collection of match rows as last delivered by the service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateStore {
    records: Vec<MatchRecord>,
}

impl CandidateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swaps the whole collection, preserving the given order.
    ///
    /// `is_shortlisted` is re-derived from `status` on every row so the pair
    /// never disagrees, whatever the service sent.
    pub fn replace(&mut self, mut records: Vec<MatchRecord>) {
        for record in &mut records {
            record.normalize_shortlist_flag();
        }
        self.records = records;
    }

    /// Applies `patch` to every row belonging to `candidate_id`.
    ///
    /// Status is tracked per person by the service, so all of the candidate's
    /// job-description rows change together. Row order is untouched.
    pub fn patch_candidate(&mut self, candidate_id: u64, patch: &StatusPatch) -> PatchOutcome {
        let mut outcome = PatchOutcome {
            new_status: patch.status,
            ..PatchOutcome::default()
        };

        for record in self.records.iter_mut().filter(|r| r.id == candidate_id) {
            if outcome.previous_status.is_none() {
                outcome.previous_status = Some(record.status);
            }
            let was_shortlisted = record.status.is_shortlisted();
            patch.apply(record);
            match (was_shortlisted, record.status.is_shortlisted()) {
                (false, true) => outcome.rows_entered_shortlist += 1,
                (true, false) => outcome.rows_left_shortlist += 1,
                _ => {}
            }
            outcome.rows_patched += 1;
        }

        outcome
    }

    pub fn all(&self) -> &[MatchRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Status of the candidate as seen on their first row.
    pub fn status_of(&self, candidate_id: u64) -> Option<CandidateStatus> {
        self.records
            .iter()
            .find(|r| r.id == candidate_id)
            .map(|r| r.status)
    }

    pub fn keys(&self) -> HashSet<MatchKey> {
        self.records.iter().map(MatchRecord::key).collect()
    }

    pub fn shortlisted_rows(&self) -> usize {
        self.records.iter().filter(|r| r.is_shortlisted).count()
    }

    pub fn shortlisted_people(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.is_shortlisted)
            .map(|r| r.id)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Number of rows carrying at least one score outside `[0, 1]`.
    pub fn out_of_range_rows(&self) -> usize {
        self.records.iter().filter(|r| !r.scores_in_range()).count()
    }
}

/// What a [`CandidateStore::patch_candidate`] call changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatchOutcome {
    pub rows_patched: usize,
    pub rows_entered_shortlist: usize,
    pub rows_left_shortlist: usize,
    pub previous_status: Option<CandidateStatus>,
    pub new_status: CandidateStatus,
}

impl PatchOutcome {
    /// Change to apply to the shortlisted count under the given counting basis.
    pub fn shortlist_delta(&self, basis: ShortlistBasis) -> i64 {
        match basis {
            ShortlistBasis::MatchRows => {
                self.rows_entered_shortlist as i64 - self.rows_left_shortlist as i64
            }
            ShortlistBasis::People => {
                let Some(previous) = self.previous_status else {
                    return 0;
                };
                match (previous.is_shortlisted(), self.new_status.is_shortlisted()) {
                    (false, true) => 1,
                    (true, false) => -1,
                    _ => 0,
                }
            }
        }
    }
}
