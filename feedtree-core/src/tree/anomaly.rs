// src/tree/anomaly.rs
use serde::Serialize;

use super::record::InstanceId;

/// Data problems noticed while integrating. None of them stop integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// A second parentless instance showed up; `existing` stays the root.
    RootConflict {
        existing: InstanceId,
        candidate: InstanceId,
    },
    /// A record was re-delivered with a different parent.
    Reparented {
        id: InstanceId,
        from: Option<InstanceId>,
        to: Option<InstanceId>,
    },
    /// Record without a usable id; skipped.
    MalformedRecord { reason: String },
    /// Parent chain loops back on `id`; the loop is cut there.
    Cycle { id: InstanceId },
    /// Locally added node whose parent is not in the current snapshot.
    OrphanLocalInsert {
        id: InstanceId,
        parent_id: InstanceId,
    },
}

impl Anomaly {
    pub fn event(&self) -> &'static str {
        match self {
            Anomaly::RootConflict { .. } => "root_conflict",
            Anomaly::Reparented { .. } => "reparented",
            Anomaly::MalformedRecord { .. } => "malformed_record",
            Anomaly::Cycle { .. } => "cycle",
            Anomaly::OrphanLocalInsert { .. } => "orphan_local_insert",
        }
    }
}
