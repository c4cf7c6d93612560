// src/tree/layout.rs
//! One-shot layout builder for a fully resident instance list.
//!
//! Produces index-addressed nodes and links (the shape force-directed graph
//! renderers consume) plus a row count used to size the canvas. Only records
//! reachable from the chosen root are included, which is how a caller renders
//! just the subtree under a selected instance.

use serde::Serialize;

use super::record::{InstanceId, InstanceRecord, parent_of};
use crate::config::LayoutConfig;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutNode<'a, R> {
    pub item: &'a R,
    pub index: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_root: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayoutLink {
    pub source: usize,
    pub target: usize,
    pub value: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeLayout<'a, R> {
    pub nodes: Vec<LayoutNode<'a, R>>,
    pub links: Vec<LayoutLink>,
    pub total_rows: usize,
}

impl<R> TreeLayout<'_, R> {
    /// Canvas height for this layout's row count under `metrics`.
    pub fn canvas_height(&self, metrics: &LayoutConfig) -> u32 {
        metrics.canvas_height(self.total_rows)
    }

    pub fn ids(&self) -> Vec<InstanceId>
    where
        R: InstanceRecord,
    {
        self.nodes.iter().filter_map(|n| n.item.id()).collect()
    }
}

// Working state threaded through the recursion.
struct Walk<'a, R> {
    items: &'a [R],
    /// Indices into `items` not placed yet, in reversed input order.
    working: Vec<usize>,
    nodes: Vec<LayoutNode<'a, R>>,
    links: Vec<LayoutLink>,
    total_rows: usize,
}

/// Build the layout rooted at the first record whose parent is `root_parent`
/// (`None` picks the parentless record).
///
/// The input is walked newest-first (reversed), which only changes index
/// order. With no matching root the layout has no nodes but still counts one
/// row.
pub fn build_layout<R: InstanceRecord>(
    items: &[R],
    root_parent: Option<InstanceId>,
) -> TreeLayout<'_, R> {
    let root_parent = root_parent.filter(|p| *p != 0);
    let mut walk = Walk {
        items,
        working: (0..items.len()).rev().collect(),
        nodes: Vec::new(),
        links: Vec::new(),
        total_rows: 0,
    };

    let root_pos = walk
        .working
        .iter()
        .position(|&i| parent_of(&items[i]) == root_parent);

    walk.total_rows += 1;
    if let Some(pos) = root_pos {
        let idx = walk.working.remove(pos);
        walk.nodes.push(LayoutNode {
            item: &items[idx],
            index: 0,
            is_root: true,
        });
        if let Some(root_id) = items[idx].id() {
            attach_children(&mut walk, root_id, 0, 1);
        }
    } else {
        tracing::debug!(?root_parent, "no root record for layout");
    }

    TreeLayout {
        nodes: walk.nodes,
        links: walk.links,
        total_rows: walk.total_rows,
    }
}

// Children of one placed record still waiting to be placed.
struct Level {
    parent_index: usize,
    row: usize,
    pending: std::vec::IntoIter<usize>,
}

// Depth-first placement with an explicit stack, in the same order a recursive
// walk would use.
fn attach_children<R: InstanceRecord>(
    walk: &mut Walk<'_, R>,
    parent_id: InstanceId,
    parent_index: usize,
    parent_row: usize,
) {
    let items = walk.items;
    let mut stack: Vec<Level> = open_level(walk, parent_id, parent_index, parent_row)
        .into_iter()
        .collect();

    while let Some(level) = stack.last_mut() {
        let Some(idx) = level.pending.next() else {
            stack.pop();
            continue;
        };
        let (parent_index, row) = (level.parent_index, level.row);
        let Some(pos) = walk.working.iter().position(|&i| i == idx) else {
            continue;
        };
        walk.working.remove(pos);

        let index = walk.nodes.len();
        walk.nodes.push(LayoutNode {
            item: &items[idx],
            index,
            is_root: false,
        });
        walk.links.push(LayoutLink {
            source: parent_index,
            target: index,
            value: 1,
        });
        if let Some(child_id) = items[idx].id() {
            stack.extend(open_level(walk, child_id, index, row));
        }
    }
}

fn open_level<R: InstanceRecord>(
    walk: &mut Walk<'_, R>,
    parent_id: InstanceId,
    parent_index: usize,
    parent_row: usize,
) -> Option<Level> {
    let items = walk.items;
    let children: Vec<usize> = walk
        .working
        .iter()
        .copied()
        .filter(|&i| parent_of(&items[i]) == Some(parent_id))
        .collect();
    if children.is_empty() {
        return None;
    }

    // a deeper level with records left to place gets its own row
    let row = parent_row + 1;
    if row > walk.total_rows {
        walk.total_rows = row;
    }
    Some(Level {
        parent_index,
        row,
        pending: children.into_iter(),
    })
}
