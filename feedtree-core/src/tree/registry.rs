// src/tree/registry.rs
//! Node registry: the single source of truth while a session integrates pages.
//!
//! - One entry per instance id; children are stored as ids (arena style) so a
//!   placeholder can be upgraded in place without touching its parent.
//! - Every mutation marks the touched ids dirty. The integrator drains the
//!   dirty set when it re-derives a snapshot.
//! - Nothing here fails: malformed input is reported as `None`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::record::{InstanceId, InstanceRecord, parent_of, synthetic_label};

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryNode<P> {
    pub id: InstanceId,
    pub parent_id: Option<InstanceId>,
    pub display_name: String,
    pub payload: Option<Arc<P>>,
    /// Child ids in arrival order, no duplicates.
    pub children: Vec<InstanceId>,
}

impl<P> RegistryNode<P> {
    fn placeholder(id: InstanceId) -> Self {
        Self {
            id,
            parent_id: None,
            display_name: synthetic_label(id),
            payload: None,
            children: Vec::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.payload.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NodeRegistry<P> {
    nodes: HashMap<InstanceId, RegistryNode<P>>,
    dirty: HashSet<InstanceId>,
}

impl<P> Default for NodeRegistry<P> {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
            dirty: HashSet::new(),
        }
    }
}

// Dirty marks are bookkeeping, not state.
impl<P: PartialEq> PartialEq for NodeRegistry<P> {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl<P> NodeRegistry<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: InstanceId) -> Option<&RegistryNode<P>> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids referenced as a parent whose own record has not arrived yet.
    pub fn placeholders(&self) -> Vec<InstanceId> {
        let mut ids: Vec<InstanceId> = self
            .nodes
            .values()
            .filter(|n| n.is_placeholder())
            .map(|n| n.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Existing node for `id`, or a fresh placeholder (`"Node {id}"`, no payload).
    pub fn ensure_placeholder(&mut self, id: InstanceId) -> &RegistryNode<P> {
        if !self.nodes.contains_key(&id) {
            self.dirty.insert(id);
        }
        self.nodes
            .entry(id)
            .or_insert_with(|| RegistryNode::placeholder(id))
    }

    /// Append `child_id` under `parent_id` unless it is already there.
    /// A missing parent gets a placeholder. Returns true if a link was added.
    pub fn link_child(&mut self, parent_id: InstanceId, child_id: InstanceId) -> bool {
        if !self.nodes.contains_key(&parent_id) {
            self.dirty.insert(parent_id);
        }
        let parent = self
            .nodes
            .entry(parent_id)
            .or_insert_with(|| RegistryNode::placeholder(parent_id));
        if parent.children.contains(&child_id) {
            return false;
        }
        parent.children.push(child_id);
        self.dirty.insert(parent_id);
        true
    }

    /// Drop `child_id` from `parent_id`'s children. Returns true if it was there.
    pub fn unlink_child(&mut self, parent_id: InstanceId, child_id: InstanceId) -> bool {
        let Some(parent) = self.nodes.get_mut(&parent_id) else {
            return false;
        };
        let before = parent.children.len();
        parent.children.retain(|c| *c != child_id);
        if parent.children.len() == before {
            return false;
        }
        self.dirty.insert(parent_id);
        true
    }

    pub(crate) fn take_dirty(&mut self) -> HashSet<InstanceId> {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }
}

impl<P: InstanceRecord + PartialEq> NodeRegistry<P> {
    /// Insert or update the node for `record`.
    ///
    /// - New id: creates the node.
    /// - Placeholder: overwrites name, payload and parent; keeps id and children.
    /// - Known node: same overwrite (re-delivery). A record equal by value to the
    ///   stored one changes nothing and leaves the node clean, so an identical
    ///   re-delivered page keeps the snapshot identity.
    ///
    /// Returns `None` when the record has no usable id.
    pub fn upsert(&mut self, record: Arc<P>) -> Option<&RegistryNode<P>> {
        let id = record.id().filter(|id| *id != 0)?;
        let parent_id = parent_of(record.as_ref());
        let display_name = record
            .display_name()
            .unwrap_or_else(|| synthetic_label(id));

        let node = self
            .nodes
            .entry(id)
            .or_insert_with(|| RegistryNode::placeholder(id));
        let unchanged = node.parent_id == parent_id
            && node.display_name == display_name
            && node.payload.as_deref() == Some(record.as_ref());
        if !unchanged {
            node.parent_id = parent_id;
            node.display_name = display_name;
            node.payload = Some(record);
            self.dirty.insert(id);
        }
        Some(&*node)
    }
}
