use std::collections::{BTreeMap, BTreeSet};

use crate::store::CandidateStore;
use crate::types::MatchKey;

/// Match rows the operator picked for a bulk action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    keys: BTreeSet<MatchKey>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or removes `key`; returns `true` when the set changed.
    pub fn set(&mut self, key: MatchKey, selected: bool) -> bool {
        if selected {
            self.keys.insert(key)
        } else {
            self.keys.remove(&key)
        }
    }

    pub fn contains(&self, key: &MatchKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &MatchKey> {
        self.keys.iter()
    }

    /// Distinct candidate ids in the selection, ascending.
    pub fn candidate_ids(&self) -> BTreeSet<u64> {
        self.keys.iter().map(|key| key.candidate_id).collect()
    }

    /// Candidate ids grouped by the job description of the selected row.
    pub fn group_by_jd(&self) -> BTreeMap<u64, Vec<u64>> {
        let mut groups: BTreeMap<u64, BTreeSet<u64>> = BTreeMap::new();
        for key in &self.keys {
            groups.entry(key.jd_id).or_default().insert(key.candidate_id);
        }
        groups
            .into_iter()
            .map(|(jd_id, ids)| (jd_id, ids.into_iter().collect()))
            .collect()
    }

    /// Drops keys whose row is no longer in `store`; returns how many were dropped.
    pub fn retain_present(&mut self, store: &CandidateStore) -> usize {
        let present = store.keys();
        let before = self.keys.len();
        self.keys.retain(|key| present.contains(key));
        before - self.keys.len()
    }
}
