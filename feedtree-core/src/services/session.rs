// src/services/session.rs
//! Paginated fetch coordination for one feed.
//!
//! - A `TreeSession` owns a fresh integrator (registry + root tracker); nothing
//!   is shared between sessions.
//! - `load` counts once, then fetches pages newest to oldest, one at a time,
//!   each await raced against the session's cancellation token.
//! - Snapshots are emitted every `emit_every_pages` pages and after the last.
//! - `add_node_locally` may run while `load` is in flight: the state mutex is
//!   never held across an await, so whichever writes last wins.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::source::{FeedId, InstanceSource, page_plan};
use crate::config::FetchConfig;
use crate::error::TreeError;
use crate::tree::{
    Anomaly, BatchIntegrator, InstanceId, InstanceRecord, LocalInsert, RootedTreeSnapshot,
};

/// What a renderer polls or subscribes to.
#[derive(Debug)]
pub struct TreeView<R> {
    pub snapshot: RootedTreeSnapshot<R>,
    pub is_loading: bool,
    /// Integrated pages not reflected in `snapshot` yet.
    pub is_processing: bool,
    pub has_more: bool,
    pub error: Option<TreeError>,
}

impl<R> Clone for TreeView<R> {
    fn clone(&self) -> Self {
        Self {
            snapshot: self.snapshot.clone(),
            is_loading: self.is_loading,
            is_processing: self.is_processing,
            has_more: self.has_more,
            error: self.error.clone(),
        }
    }
}

impl<R> Default for TreeView<R> {
    fn default() -> Self {
        Self {
            snapshot: RootedTreeSnapshot::empty(),
            is_loading: false,
            is_processing: false,
            has_more: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total: usize,
    pub chunk: usize,
    pub pages: usize,
    pub integrated: usize,
    pub skipped: usize,
    pub emissions: usize,
}

pub struct TreeSession<R> {
    feed: FeedId,
    config: FetchConfig,
    cancel: CancellationToken,
    state: Mutex<BatchIntegrator<R>>,
    view: watch::Sender<TreeView<R>>,
}

impl<R> TreeSession<R> {
    pub fn new(feed: FeedId, config: FetchConfig) -> Self {
        Self::with_token(feed, config, CancellationToken::new())
    }

    pub fn with_token(feed: FeedId, config: FetchConfig, cancel: CancellationToken) -> Self {
        let (view, _) = watch::channel(TreeView::default());
        Self {
            feed,
            config,
            cancel,
            state: Mutex::new(BatchIntegrator::new()),
            view,
        }
    }

    pub fn feed(&self) -> FeedId {
        self.feed
    }

    pub fn view(&self) -> TreeView<R> {
        self.view.borrow().clone()
    }

    pub fn snapshot(&self) -> RootedTreeSnapshot<R> {
        self.view.borrow().snapshot.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TreeView<R>> {
        self.view.subscribe()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Abort the in-flight page fetch and drop everything integrated so far.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!(feed = self.feed, "cancelling tree session");
        }
        self.cancel.cancel();
        self.discard();
    }

    pub fn current_root(&self) -> Option<InstanceId> {
        self.lock().current_root()
    }

    pub fn take_anomalies(&self) -> Vec<Anomaly> {
        self.lock().take_anomalies()
    }

    fn lock(&self) -> MutexGuard<'_, BatchIntegrator<R>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn discard(&self) {
        let mut state = self.lock();
        *state = BatchIntegrator::new();
        self.view.send_replace(TreeView::default());
    }

    fn fail(&self, err: TreeError) -> TreeError {
        if err.is_cancelled() {
            self.discard();
            return err;
        }
        tracing::warn!(feed = self.feed, error = %err, "tree load failed; keeping partial tree");
        let mut state = self.lock();
        let partial = state.snapshot();
        self.view.send_modify(|v| {
            v.snapshot = partial;
            v.is_loading = false;
            v.is_processing = false;
            v.error = Some(err.clone());
        });
        err
    }
}

impl<R> TreeSession<R>
where
    R: InstanceRecord + PartialEq + Send + Sync + 'static,
{
    /// Fetch the whole feed and integrate it page by page.
    ///
    /// Any earlier state of this session is discarded first. On a fetch error
    /// the partial tree stays visible and the error is also stored in the view.
    pub async fn load<S>(&self, source: &S) -> Result<LoadReport, TreeError>
    where
        S: InstanceSource<Record = R> + ?Sized,
    {
        let feed = self.feed;
        if self.cancel.is_cancelled() {
            return Err(TreeError::Cancelled { feed });
        }

        {
            let mut state = self.lock();
            *state = BatchIntegrator::new();
            self.view.send_replace(TreeView {
                is_loading: true,
                has_more: true,
                ..TreeView::default()
            });
        }

        let total = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TreeError::Cancelled { feed }),
            res = source.count_total(feed) => res.map_err(|e| TreeError::Count {
                feed,
                reason: format!("{e:#}"),
            }),
        }
        .map_err(|e| self.fail(e))?;

        let chunk = self.config.chunk_size(total);
        let plan = page_plan(total, chunk);
        let mut report = LoadReport {
            total,
            chunk,
            ..LoadReport::default()
        };
        tracing::info!(feed, total, chunk, pages = plan.len(), "loading plugin instance tree");

        if plan.is_empty() {
            self.view.send_modify(|v| {
                v.is_loading = false;
                v.has_more = false;
            });
            return Ok(report);
        }

        let every = self.config.emit_every_pages.max(1);
        for (n, page) in plan.iter().enumerate() {
            let items = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(TreeError::Cancelled { feed }),
                res = source.fetch_page(feed, page.offset, page.limit) => res.map_err(|e| TreeError::Page {
                    feed,
                    offset: page.offset,
                    limit: page.limit,
                    reason: format!("{e:#}"),
                }),
            }
            .map_err(|e| self.fail(e))?;

            let last = n + 1 == plan.len();
            let emit = last || (n + 1) % every == 0;

            // Publish under the state lock so a concurrent cancel() cannot be
            // overwritten by a page that was already in hand.
            {
                let mut state = self.lock();
                if self.cancel.is_cancelled() {
                    drop(state);
                    return Err(self.fail(TreeError::Cancelled { feed }));
                }
                let batch = state.apply_batch(items);
                report.integrated += batch.integrated;
                report.skipped += batch.skipped;
                let snapshot = emit.then(|| state.snapshot());
                if snapshot.is_some() {
                    report.emissions += 1;
                }
                self.view.send_modify(|v| {
                    if let Some(s) = snapshot {
                        v.snapshot = s;
                        v.is_processing = false;
                    } else {
                        v.is_processing = true;
                    }
                    v.is_loading = !last;
                    v.has_more = !last;
                });
            }
            report.pages += 1;
            tracing::debug!(feed, offset = page.offset, limit = page.limit, emitted = emit, "page applied");
        }

        tracing::info!(
            feed,
            integrated = report.integrated,
            skipped = report.skipped,
            root = ?self.current_root(),
            "plugin instance tree loaded"
        );
        Ok(report)
    }

    /// Splice one freshly created instance into the current tree without a refetch.
    pub fn add_node_locally(&self, record: R) -> LocalInsert {
        let mut state = self.lock();
        if self.cancel.is_cancelled() {
            return LocalInsert::Rejected;
        }
        let outcome = state.insert_local(record);
        let snapshot = state.last_snapshot();
        self.view.send_modify(|v| v.snapshot = snapshot);
        outcome
    }
}

impl<R> Drop for TreeSession<R> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Keeps at most one live session, keyed by feed.
///
/// Opening a feed cancels whatever session was live before, so switching feeds
/// never leaks a half-built tree into the next one.
pub struct FeedTreeCoordinator<R> {
    config: FetchConfig,
    current: Option<Arc<TreeSession<R>>>,
}

impl<R> FeedTreeCoordinator<R> {
    pub fn new(config: FetchConfig) -> Self {
        Self {
            config,
            current: None,
        }
    }

    /// Start a fresh session for `feed`.
    pub fn open(&mut self, feed: FeedId) -> Arc<TreeSession<R>> {
        self.close();
        let session = Arc::new(TreeSession::new(feed, self.config.clone()));
        self.current = Some(session.clone());
        session
    }

    pub fn current(&self) -> Option<&Arc<TreeSession<R>>> {
        self.current.as_ref()
    }

    pub fn close(&mut self) {
        if let Some(prev) = self.current.take() {
            prev.cancel();
        }
    }
}
