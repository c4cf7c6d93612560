// src/services/source.rs
//! The data-fetching boundary.
//!
//! The tree core never talks HTTP. A consumer hands it something that can count
//! a feed's plugin instances and return an offset/limit window of them; page
//! ordering and chunking are decided here.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::tree::InstanceRecord;

pub type FeedId = u64;

/// Paginated access to the plugin instances of one feed.
#[async_trait]
pub trait InstanceSource: Send + Sync {
    type Record: InstanceRecord + Send + Sync + 'static;

    /// Total number of instances (a count-only query).
    async fn count_total(&self, feed: FeedId) -> Result<usize>;

    /// Instances `offset .. offset + limit`.
    async fn fetch_page(&self, feed: FeedId, offset: usize, limit: usize)
    -> Result<Vec<Self::Record>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

/// Page windows for `total` items, newest (highest offset) first.
///
/// Windows are contiguous and never overlap; the last one starts at 0 and may
/// be shorter than `chunk`.
pub fn page_plan(total: usize, chunk: usize) -> Vec<PageRequest> {
    if total == 0 || chunk == 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(total.div_ceil(chunk));
    let mut end = total;
    while end > 0 {
        let offset = end.saturating_sub(chunk);
        out.push(PageRequest {
            offset,
            limit: end - offset,
        });
        end = offset;
    }
    out
}

/// In-memory source over a resident list (admin tooling, tests).
#[derive(Debug, Default)]
pub struct StaticSource<R> {
    records: Vec<R>,
    pages_served: AtomicUsize,
}

impl<R> StaticSource<R> {
    pub fn new(records: Vec<R>) -> Self {
        Self {
            records,
            pages_served: AtomicUsize::new(0),
        }
    }

    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<R> InstanceSource for StaticSource<R>
where
    R: InstanceRecord + Clone + Send + Sync + 'static,
{
    type Record = R;

    async fn count_total(&self, _feed: FeedId) -> Result<usize> {
        Ok(self.records.len())
    }

    async fn fetch_page(&self, _feed: FeedId, offset: usize, limit: usize) -> Result<Vec<R>> {
        self.pages_served.fetch_add(1, Ordering::Relaxed);
        let start = offset.min(self.records.len());
        let end = offset.saturating_add(limit).min(self.records.len());
        Ok(self.records[start..end].to_vec())
    }
}
