// src/services/mod.rs

pub mod session;   // paging policy, cancellation, snapshot emission
pub mod source;    // the injected data-fetching capability

// Public API
pub use session::{FeedTreeCoordinator, LoadReport, TreeSession, TreeView};
pub use source::{FeedId, InstanceSource, PageRequest, StaticSource, page_plan};
