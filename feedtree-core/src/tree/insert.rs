// src/tree/insert.rs
//! Immutable path-copy insertion.
//!
//! Adding a node under `parent_id` clones only the chain of ancestors from that
//! parent up to the root. Every other subtree is shared with the old tree by
//! `Arc`, so renderers can skip everything whose pointer did not move.

use std::sync::Arc;

use super::node::TreeNode;
use super::record::InstanceId;

/// Returns the new root, or `None` if `parent_id` is not in the tree.
///
/// If the parent already has a child with the same id it is replaced in place
/// rather than duplicated.
pub fn insert_path_copy<P>(
    root: &Arc<TreeNode<P>>,
    parent_id: InstanceId,
    child: Arc<TreeNode<P>>,
) -> Option<Arc<TreeNode<P>>> {
    let path = path_to(root, parent_id)?;

    // chain[i] is the ancestor whose child at path[i] leads towards the parent
    let mut chain: Vec<&Arc<TreeNode<P>>> = Vec::with_capacity(path.len() + 1);
    chain.push(root);
    for &pos in &path {
        let last = chain[chain.len() - 1];
        chain.push(&last.children[pos]);
    }
    let parent = chain.pop()?;

    let mut copy = parent.shallow_clone();
    match copy.children.iter().position(|c| c.id == child.id) {
        Some(pos) => copy.children[pos] = child,
        None => copy.children.push(child),
    }
    let mut rebuilt = Arc::new(copy);

    for (node, &pos) in chain.iter().rev().zip(path.iter().rev()) {
        let mut copy = node.shallow_clone();
        copy.children[pos] = rebuilt;
        rebuilt = Arc::new(copy);
    }
    Some(rebuilt)
}

/// Child positions leading from `root` down to `target`.
fn path_to<P>(root: &TreeNode<P>, target: InstanceId) -> Option<Vec<usize>> {
    if root.id == target {
        return Some(Vec::new());
    }
    let mut stack: Vec<(&TreeNode<P>, usize)> = vec![(root, 0)];
    while let Some(top) = stack.last_mut() {
        let (node, next) = *top;
        let Some(child) = node.children.get(next) else {
            stack.pop();
            continue;
        };
        top.1 += 1;
        if child.id == target {
            return Some(stack.iter().map(|(_, n)| n - 1).collect());
        }
        stack.push((child.as_ref(), 0));
    }
    None
}
