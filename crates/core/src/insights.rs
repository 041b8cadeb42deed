use crate::types::InsightsSnapshot;

/// Holds the last known insights snapshot and the running shortlist count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsightsAggregate {
    snapshot: Option<InsightsSnapshot>,
}

impl InsightsAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, snapshot: InsightsSnapshot) {
        self.snapshot = Some(snapshot);
    }

    /// Adds `delta` to the shortlisted count, never going below zero.
    ///
    /// Returns the new count, or `None` when no snapshot has been obtained yet,
    /// in which case nothing changes.
    pub fn adjust_shortlist_count(&mut self, delta: i64) -> Option<u64> {
        let snapshot = self.snapshot.as_mut()?;
        let current = snapshot.shortlisted_candidates;
        snapshot.shortlisted_candidates = if delta >= 0 {
            current.saturating_add(delta.unsigned_abs())
        } else {
            current.saturating_sub(delta.unsigned_abs())
        };
        Some(snapshot.shortlisted_candidates)
    }

    pub fn snapshot(&self) -> Option<&InsightsSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn shortlisted_count(&self) -> Option<u64> {
        self.snapshot.as_ref().map(|s| s.shortlisted_candidates)
    }
}
