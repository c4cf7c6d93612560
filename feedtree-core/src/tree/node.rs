// src/tree/node.rs
//! Immutable snapshot nodes handed to renderers.
//!
//! Nodes are shared behind `Arc`. A rebuilt snapshot reuses the `Arc` of every
//! subtree that did not change, so `Arc::ptr_eq` is a valid "did this change"
//! test downstream.

use serde::Serialize;
use std::sync::Arc;

use super::record::InstanceId;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode<P> {
    pub id: InstanceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<InstanceId>,
    pub display_name: String,
    /// `None` while the node is a placeholder.
    pub payload: Option<Arc<P>>,
    pub children: Vec<Arc<TreeNode<P>>>,
}

impl<P> TreeNode<P> {
    pub fn is_placeholder(&self) -> bool {
        self.payload.is_none()
    }

    /// Shallow copy: same payload, same child `Arc`s.
    pub fn shallow_clone(&self) -> Self {
        Self {
            id: self.id,
            parent_id: self.parent_id,
            display_name: self.display_name.clone(),
            payload: self.payload.clone(),
            children: self.children.clone(),
        }
    }

    pub fn child(&self, id: InstanceId) -> Option<&Arc<TreeNode<P>>> {
        self.children.iter().find(|c| c.id == id)
    }

    /// Depth-first search for `id` in this subtree.
    pub fn find(&self, id: InstanceId) -> Option<&TreeNode<P>> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.id == id {
                return Some(node);
            }
            stack.extend(node.children.iter().rev().map(|c| c.as_ref()));
        }
        None
    }

    pub fn count(&self) -> usize {
        let mut n = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            n += 1;
            stack.extend(node.children.iter().map(|c| c.as_ref()));
        }
        n
    }

    /// Number of levels in this subtree (a leaf has depth 1).
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, level)) = stack.pop() {
            deepest = deepest.max(level);
            stack.extend(node.children.iter().map(|c| (c.as_ref(), level + 1)));
        }
        deepest
    }

    /// Pre-order list of ids.
    pub fn ids(&self) -> Vec<InstanceId> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node.id);
            stack.extend(node.children.iter().rev().map(|c| c.as_ref()));
        }
        out
    }
}

// Unlinks uniquely owned children one by one so dropping a long chain does
// not recurse once per level.
impl<P> Drop for TreeNode<P> {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(child) = stack.pop() {
            if let Some(mut node) = Arc::into_inner(child) {
                stack.append(&mut node.children);
            }
        }
    }
}

/// Rooted view of the tree at one point in time (`None` until a root is known).
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct RootedTreeSnapshot<P> {
    root: Option<Arc<TreeNode<P>>>,
}

// manual impls: no `P: Clone` / `P: Default` bound needed
impl<P> Clone for RootedTreeSnapshot<P> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<P> Default for RootedTreeSnapshot<P> {
    fn default() -> Self {
        Self { root: None }
    }
}

impl<P> RootedTreeSnapshot<P> {
    pub fn new(root: Option<Arc<TreeNode<P>>>) -> Self {
        Self { root }
    }

    pub fn empty() -> Self {
        Self { root: None }
    }

    pub fn root(&self) -> Option<&Arc<TreeNode<P>>> {
        self.root.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Reference equality on the root. Two empty snapshots are the same.
    pub fn same_as(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    pub fn find(&self, id: InstanceId) -> Option<&TreeNode<P>> {
        self.root.as_deref().and_then(|r| r.find(id))
    }

    pub fn node_count(&self) -> usize {
        self.root.as_deref().map_or(0, TreeNode::count)
    }
}
