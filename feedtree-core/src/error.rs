// src/error.rs
use thiserror::Error;

use crate::services::FeedId;

/// Failures at the paging boundary. Tree construction itself never fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("counting plugin instances of feed {feed} failed: {reason}")]
    Count { feed: FeedId, reason: String },

    #[error("fetching plugin instances of feed {feed} (offset {offset}, limit {limit}) failed: {reason}")]
    Page {
        feed: FeedId,
        offset: usize,
        limit: usize,
        reason: String,
    },

    #[error("tree session for feed {feed} was cancelled")]
    Cancelled { feed: FeedId },
}

impl TreeError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TreeError::Cancelled { .. })
    }
}
