// src/tree/root.rs
//! Single-root bookkeeping for one integration session.
//!
//! A feed has exactly one instance with no "previous" instance. The first
//! parentless id observed wins for the whole session; any other parentless id
//! is a data anomaly that gets flagged, never fatal.

use std::collections::HashSet;

use super::record::InstanceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootObservation {
    /// No root was known; this id is the root now.
    Accepted,
    /// Same id as the recorded root (re-delivery).
    Repeated,
    /// A different root was already recorded and stays authoritative.
    Conflict { existing: InstanceId },
}

#[derive(Debug, Clone, Default)]
pub struct RootTracker {
    root: Option<InstanceId>,
    conflicts: Vec<InstanceId>,
    seen_conflicts: HashSet<InstanceId>,
}

impl RootTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe_candidate(&mut self, id: InstanceId) -> RootObservation {
        match self.root {
            None => {
                self.root = Some(id);
                tracing::debug!(root = id, "root instance recorded");
                RootObservation::Accepted
            }
            Some(existing) if existing == id => RootObservation::Repeated,
            Some(existing) => {
                if self.seen_conflicts.insert(id) {
                    self.conflicts.push(id);
                    tracing::warn!(
                        existing,
                        candidate = id,
                        "multiple parentless instances; keeping the first root"
                    );
                }
                RootObservation::Conflict { existing }
            }
        }
    }

    pub fn current_root(&self) -> Option<InstanceId> {
        self.root
    }

    /// Distinct rejected root candidates, in the order they were seen.
    pub fn conflicts(&self) -> &[InstanceId] {
        &self.conflicts
    }
}
