// src/tree/integrator.rs
//! Batch integrator: applies pages of flat records to a registry + root tracker
//! and derives rooted snapshots from them.
//!
//! - Order independent: a child arriving before its parent links to a
//!   placeholder that is upgraded when the parent's record lands.
//! - Snapshots reuse the `Arc` of every subtree that did not change since the
//!   last one; an unchanged tree yields the very same root pointer.
//! - Nothing in here returns an error. Bad data becomes an [`Anomaly`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::anomaly::Anomaly;
use super::insert::insert_path_copy;
use super::node::{RootedTreeSnapshot, TreeNode};
use super::record::{InstanceId, InstanceRecord, parent_of};
use super::registry::{NodeRegistry, RegistryNode};
use super::root::{RootObservation, RootTracker};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub integrated: usize,
    pub skipped: usize,
}

/// Outcome of [`BatchIntegrator::insert_local`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalInsert {
    /// Spliced into the snapshot under its parent.
    Attached,
    /// Snapshot was empty; the record is the (provisional) root now.
    BecameRoot,
    /// Parent not in the snapshot yet; kept in the registry only.
    Deferred,
    /// Record had no usable id.
    Rejected,
}

pub struct BatchIntegrator<P> {
    registry: NodeRegistry<P>,
    roots: RootTracker,
    anomalies: Vec<Anomaly>,
    reported_cycles: HashSet<InstanceId>,
    provisional_root: Option<InstanceId>,
    built: HashMap<InstanceId, Arc<TreeNode<P>>>,
    snapshot: RootedTreeSnapshot<P>,
}

impl<P> Default for BatchIntegrator<P> {
    fn default() -> Self {
        Self {
            registry: NodeRegistry::new(),
            roots: RootTracker::new(),
            anomalies: Vec::new(),
            reported_cycles: HashSet::new(),
            provisional_root: None,
            built: HashMap::new(),
            snapshot: RootedTreeSnapshot::empty(),
        }
    }
}

impl<P> BatchIntegrator<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &NodeRegistry<P> {
        &self.registry
    }

    pub fn roots(&self) -> &RootTracker {
        &self.roots
    }

    pub fn current_root(&self) -> Option<InstanceId> {
        self.roots.current_root()
    }

    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }

    pub fn take_anomalies(&mut self) -> Vec<Anomaly> {
        std::mem::take(&mut self.anomalies)
    }

    /// Last snapshot handed out, without re-deriving.
    pub fn last_snapshot(&self) -> RootedTreeSnapshot<P> {
        self.snapshot.clone()
    }

    /// Re-derive the snapshot from the registry.
    ///
    /// Uses the recorded root, or the provisional root set by a local insert
    /// while no real root was known.
    pub fn snapshot(&mut self) -> RootedTreeSnapshot<P> {
        let Some(root_id) = self.roots.current_root().or(self.provisional_root) else {
            self.snapshot = RootedTreeSnapshot::empty();
            return self.snapshot.clone();
        };

        let current = self.snapshot.root().map(|r| r.id);
        if !self.registry.has_dirty() && current == Some(root_id) {
            return self.snapshot.clone();
        }

        let dirty = self.registry.take_dirty();
        let mut build = Materializer {
            registry: &self.registry,
            built: &mut self.built,
            dirty: &dirty,
            path: HashSet::new(),
            visited: HashSet::new(),
            anomalies: &mut self.anomalies,
            reported_cycles: &mut self.reported_cycles,
        };
        let root = build.node(root_id);
        let visited = build.visited;

        // Dirty nodes outside the tree right now must not be reused stale later.
        for id in dirty.iter().filter(|id| !visited.contains(id)) {
            self.built.remove(id);
        }

        self.snapshot = RootedTreeSnapshot::new(root);
        self.snapshot.clone()
    }

    fn note(&mut self, anomaly: Anomaly) {
        self.anomalies.push(anomaly);
    }
}

impl<P: InstanceRecord + PartialEq> BatchIntegrator<P> {
    /// Apply one page of records. Records without a usable id are skipped.
    pub fn apply_batch<I>(&mut self, records: I) -> BatchReport
    where
        I: IntoIterator<Item = P>,
    {
        let mut report = BatchReport::default();
        for record in records {
            if self.apply_record(Arc::new(record)).is_some() {
                report.integrated += 1;
            } else {
                report.skipped += 1;
            }
        }
        tracing::debug!(
            integrated = report.integrated,
            skipped = report.skipped,
            nodes = self.registry.len(),
            "batch integrated"
        );
        report
    }

    /// Integrate a single record; returns its id, or `None` if skipped.
    pub fn apply_record(&mut self, record: Arc<P>) -> Option<InstanceId> {
        let Some(id) = record.id().filter(|id| *id != 0) else {
            tracing::warn!("skipping instance record without an id");
            self.note(Anomaly::MalformedRecord {
                reason: "missing id".to_string(),
            });
            return None;
        };
        let parent = parent_of(record.as_ref());

        // Last write wins; the stale link on the former parent goes away.
        let previous = self
            .registry
            .get(id)
            .filter(|n| !n.is_placeholder())
            .map(|n| n.parent_id);
        if let Some(prev) = previous {
            if prev != parent {
                tracing::warn!(id, from = ?prev, to = ?parent, "instance re-parented");
                if let Some(old) = prev {
                    self.registry.unlink_child(old, id);
                }
                self.note(Anomaly::Reparented {
                    id,
                    from: prev,
                    to: parent,
                });
            }
        }

        self.registry.upsert(record);

        match parent {
            None => {
                let before = self.roots.conflicts().len();
                if let RootObservation::Conflict { existing } = self.roots.observe_candidate(id) {
                    if self.roots.conflicts().len() > before {
                        self.note(Anomaly::RootConflict {
                            existing,
                            candidate: id,
                        });
                    }
                }
            }
            Some(p) if p == id => {
                tracing::warn!(id, "instance lists itself as previous; not linked");
                if self.reported_cycles.insert(id) {
                    self.note(Anomaly::Cycle { id });
                }
            }
            Some(p) => {
                self.registry.ensure_placeholder(p);
                self.registry.link_child(p, id);
            }
        }
        Some(id)
    }

    /// Add one freshly created record without a refetch.
    ///
    /// The record goes into the registry (so later batch snapshots keep it) and
    /// is spliced into the current snapshot by path copy: only its ancestors get
    /// new `Arc`s. Pages integrated since the last emitted snapshot are folded
    /// in first, so the insert lands after the latest batch.
    pub fn insert_local(&mut self, record: P) -> LocalInsert {
        if self.registry.has_dirty() && !self.snapshot.is_empty() {
            self.snapshot();
        }

        let record = Arc::new(record);
        let noted = self.anomalies.len();
        let Some(id) = self.apply_record(record.clone()) else {
            return LocalInsert::Rejected;
        };
        let parent = parent_of(record.as_ref());

        // a move must drop the node from its old parent, which path copy cannot do
        let moved = self.anomalies[noted..]
            .iter()
            .any(|a| matches!(a, Anomaly::Reparented { id: r, .. } if *r == id));
        if moved {
            tracing::debug!(id, "local insert moved an instance; re-deriving");
            return self.rederive(id);
        }

        let leaf = match self.registry.get(id) {
            Some(entry) => Arc::new(TreeNode {
                id,
                parent_id: entry.parent_id,
                display_name: entry.display_name.clone(),
                payload: entry.payload.clone(),
                children: entry
                    .children
                    .iter()
                    .filter_map(|c| self.built.get(c).cloned())
                    .collect(),
            }),
            None => return LocalInsert::Rejected,
        };

        let Some(root) = self.snapshot.root().cloned() else {
            return match self.roots.current_root() {
                // root known but not emitted yet (throttled): derive it now
                Some(_) => self.rederive(id),
                None => {
                    tracing::debug!(id, "local insert into empty tree; provisional root");
                    self.provisional_root = Some(id);
                    self.snapshot = RootedTreeSnapshot::new(Some(leaf));
                    LocalInsert::BecameRoot
                }
            };
        };

        let Some(parent_id) = parent else {
            // parentless record while a root exists: already flagged as a conflict
            return LocalInsert::Deferred;
        };

        match insert_path_copy(&root, parent_id, leaf) {
            Some(new_root) => {
                self.snapshot = RootedTreeSnapshot::new(Some(new_root));
                LocalInsert::Attached
            }
            None => {
                tracing::warn!(id, parent_id, "local insert parent not in current tree");
                self.note(Anomaly::OrphanLocalInsert { id, parent_id });
                LocalInsert::Deferred
            }
        }
    }

    fn rederive(&mut self, id: InstanceId) -> LocalInsert {
        let snap = self.snapshot();
        match snap.root() {
            Some(root) if root.id == id => LocalInsert::BecameRoot,
            Some(_) if snap.find(id).is_some() => LocalInsert::Attached,
            _ => LocalInsert::Deferred,
        }
    }
}

// One level of the post-order walk: a registry entry and the children built so far.
struct Frame<'r, P> {
    entry: &'r RegistryNode<P>,
    next: usize,
    children: Vec<Arc<TreeNode<P>>>,
}

struct Materializer<'a, P> {
    registry: &'a NodeRegistry<P>,
    built: &'a mut HashMap<InstanceId, Arc<TreeNode<P>>>,
    dirty: &'a HashSet<InstanceId>,
    path: HashSet<InstanceId>,
    visited: HashSet<InstanceId>,
    anomalies: &'a mut Vec<Anomaly>,
    reported_cycles: &'a mut HashSet<InstanceId>,
}

impl<'a, P> Materializer<'a, P> {
    /// Build the subtree under `id` with an explicit stack; chains of any
    /// length are fine.
    fn node(&mut self, id: InstanceId) -> Option<Arc<TreeNode<P>>> {
        let registry = self.registry;
        let mut stack = vec![self.enter(registry.get(id)?)?];

        loop {
            let top = stack.last_mut()?;
            if let Some(&child_id) = top.entry.children.get(top.next) {
                top.next += 1;
                if let Some(frame) = registry.get(child_id).and_then(|e| self.enter(e)) {
                    stack.push(frame);
                }
                continue;
            }

            let frame = stack.pop()?;
            self.path.remove(&frame.entry.id);
            let node = self.finish(frame.entry, frame.children);
            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => return Some(node),
            }
        }
    }

    fn enter(&mut self, entry: &'a RegistryNode<P>) -> Option<Frame<'a, P>> {
        let id = entry.id;
        if !self.path.insert(id) {
            if self.reported_cycles.insert(id) {
                tracing::warn!(id, "cycle in previous-instance chain; cut");
                self.anomalies.push(Anomaly::Cycle { id });
            }
            return None;
        }
        self.visited.insert(id);
        Some(Frame {
            entry,
            next: 0,
            children: Vec::new(),
        })
    }

    fn finish(&mut self, entry: &RegistryNode<P>, children: Vec<Arc<TreeNode<P>>>) -> Arc<TreeNode<P>> {
        let id = entry.id;
        if let Some(prev) = self.built.get(&id) {
            if !self.dirty.contains(&id) && same_children(&prev.children, &children) {
                return prev.clone();
            }
        }

        let node = Arc::new(TreeNode {
            id,
            parent_id: entry.parent_id,
            display_name: entry.display_name.clone(),
            payload: entry.payload.clone(),
            children,
        });
        self.built.insert(id, node.clone());
        node
    }
}

fn same_children<P>(a: &[Arc<TreeNode<P>>], b: &[Arc<TreeNode<P>>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
}
