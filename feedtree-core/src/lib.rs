// src/lib.rs
//! Plugin-instance tree construction for ChRIS feeds.
//!
//! Flat plugin-instance records (each pointing at its "previous" instance) are
//! turned into a rooted tree that graph renderers can redraw incrementally:
//!
//! - [`tree`]: registry, root tracker, batch integrator, path-copy insertion and
//!   the one-shot layout builder. All synchronous, none of it fails.
//! - [`services`]: the paginated fetch boundary and per-feed sessions.
//! - [`config`]: paging and layout knobs read from `config.toml`.

pub mod config;
pub mod error;
pub mod services;
pub mod tree;
pub mod utils;

pub use config::TreeConfig;
pub use error::TreeError;
pub use services::{FeedId, FeedTreeCoordinator, InstanceSource, StaticSource, TreeSession, TreeView};
pub use tree::{
    Anomaly, BatchIntegrator, InstanceId, InstanceRecord, PluginInstance, RootedTreeSnapshot,
    TreeNode, build_layout,
};
