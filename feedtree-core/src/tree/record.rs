// src/tree/record.rs
//! Flat instance records as delivered by the data-fetching layer.
//!
//! The tree core only needs three things from a record: its id, the id of the
//! instance it was run on ("previous"), and a label. Everything else rides along
//! as the node payload, so consumers plug in their own record type by
//! implementing [`InstanceRecord`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type InstanceId = u64;

/// Minimal view the tree builders need over a record.
pub trait InstanceRecord {
    /// Unique id within one feed. `None` marks a malformed record.
    fn id(&self) -> Option<InstanceId>;

    /// Id of the parent ("previous") instance. `None` and `Some(0)` both mean
    /// "no parent"; callers go through [`parent_of`] to normalize.
    fn parent_id(&self) -> Option<InstanceId>;

    /// Human readable label, if the record carries one.
    fn display_name(&self) -> Option<String> {
        None
    }
}

/// Parent id with `0` folded into "no parent".
pub fn parent_of<R: InstanceRecord + ?Sized>(record: &R) -> Option<InstanceId> {
    record.parent_id().filter(|p| *p != 0)
}

/// Label used for placeholders and for records without a name.
pub fn synthetic_label(id: InstanceId) -> String {
    format!("Node {id}")
}

/// Plugin instance as returned by the ChRIS REST API (`/api/v1/<feed>/plugininstances/`).
///
/// Only the fields the tree cares about are typed; the rest of the JSON object
/// is kept in `extra` so renderers still see the full record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PluginInstance {
    #[serde(default)]
    pub id: Option<InstanceId>,
    #[serde(default)]
    pub previous_id: Option<InstanceId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub plugin_name: Option<String>,
    #[serde(default)]
    pub plugin_version: Option<String>,
    #[serde(default)]
    pub plugin_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub feed_id: Option<u64>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PluginInstance {
    pub fn new(id: InstanceId, previous_id: Option<InstanceId>) -> Self {
        Self {
            id: Some(id),
            previous_id,
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_plugin(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.plugin_name = Some(name.into());
        self.plugin_version = Some(version.into());
        self
    }
}

impl InstanceRecord for PluginInstance {
    fn id(&self) -> Option<InstanceId> {
        self.id
    }

    fn parent_id(&self) -> Option<InstanceId> {
        self.previous_id
    }

    // title first; an empty title means "not set" in the UI
    fn display_name(&self) -> Option<String> {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or(self.plugin_name.as_deref().filter(|n| !n.trim().is_empty()))
            .map(str::to_string)
    }
}

/// Accepts either a bare JSON array of instances or a REST page object
/// (`{"count": .., "results": [..]}`).
pub fn parse_instances(json: &str) -> serde_json::Result<Vec<PluginInstance>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Payload {
        List(Vec<PluginInstance>),
        Page { results: Vec<PluginInstance> },
    }

    Ok(match serde_json::from_str::<Payload>(json)? {
        Payload::List(items) => items,
        Payload::Page { results } => results,
    })
}
