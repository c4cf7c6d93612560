// src/tree/mod.rs

pub mod anomaly;
pub mod insert;       // path-copy splice for locally created nodes
pub mod integrator;   // pages -> registry + root tracker -> snapshots
pub mod layout;       // one-shot node/link layout for a resident list
pub mod node;
pub mod record;
pub mod registry;
pub mod root;

// Public API
pub use anomaly::Anomaly;
pub use insert::insert_path_copy;
pub use integrator::{BatchIntegrator, BatchReport, LocalInsert};
pub use layout::{LayoutLink, LayoutNode, TreeLayout, build_layout};
pub use node::{RootedTreeSnapshot, TreeNode};
pub use record::{InstanceId, InstanceRecord, PluginInstance, parse_instances};
pub use registry::{NodeRegistry, RegistryNode};
pub use root::{RootObservation, RootTracker};
