use std::sync::Arc;

use feedtree_core::tree::{NodeRegistry, PluginInstance, RootObservation, RootTracker};

fn inst(id: u64, prev: Option<u64>, title: &str) -> Arc<PluginInstance> {
    Arc::new(PluginInstance::new(id, prev).with_title(title))
}

#[test]
fn upsert_twice_is_indistinguishable_from_once() {
    let mut once = NodeRegistry::new();
    once.upsert(inst(1, None, "pl-dircopy"));
    once.upsert(inst(2, Some(1), "pl-med2img"));
    once.link_child(1, 2);

    let mut twice = NodeRegistry::new();
    for _ in 0..2 {
        twice.upsert(inst(1, None, "pl-dircopy"));
        twice.upsert(inst(2, Some(1), "pl-med2img"));
        twice.link_child(1, 2);
    }

    assert_eq!(once, twice);
    assert_eq!(twice.get(1).unwrap().children, vec![2]);
}

#[test]
fn placeholder_is_upgraded_in_place_keeping_children() {
    let mut reg = NodeRegistry::new();
    reg.upsert(inst(5, Some(3), "child"));
    let ph = reg.ensure_placeholder(3);
    assert!(ph.is_placeholder());
    assert_eq!(ph.display_name, "Node 3");
    assert!(reg.link_child(3, 5));
    assert_eq!(reg.placeholders(), vec![3]);

    let node = reg.upsert(inst(3, None, "root")).expect("has id");
    assert!(!node.is_placeholder());
    assert_eq!(node.display_name, "root");
    assert_eq!(node.children, vec![5]);
    assert!(reg.placeholders().is_empty());
}

#[test]
fn ensure_placeholder_returns_existing_node() {
    let mut reg = NodeRegistry::new();
    reg.upsert(inst(9, None, "real"));
    let node = reg.ensure_placeholder(9);
    assert_eq!(node.display_name, "real");
    assert!(!node.is_placeholder());
    assert_eq!(reg.len(), 1);
}

#[test]
fn link_child_deduplicates_by_id() {
    let mut reg: NodeRegistry<PluginInstance> = NodeRegistry::new();
    assert!(reg.link_child(1, 2));
    assert!(!reg.link_child(1, 2));
    assert!(reg.link_child(1, 3));
    assert_eq!(reg.get(1).unwrap().children, vec![2, 3]);

    assert!(reg.unlink_child(1, 2));
    assert!(!reg.unlink_child(1, 2));
    assert_eq!(reg.get(1).unwrap().children, vec![3]);
}

#[test]
fn missing_name_falls_back_to_plugin_then_label() {
    let mut reg = NodeRegistry::new();
    let mut by_plugin = PluginInstance::new(4, Some(1)).with_plugin("pl-fshack", "1.2.0");
    by_plugin.title = Some("   ".to_string());
    reg.upsert(Arc::new(by_plugin));
    reg.upsert(Arc::new(PluginInstance::new(6, Some(1))));

    assert_eq!(reg.get(4).unwrap().display_name, "pl-fshack");
    assert_eq!(reg.get(6).unwrap().display_name, "Node 6");
}

#[test]
fn records_without_id_are_not_stored() {
    let mut reg = NodeRegistry::new();
    assert!(reg.upsert(Arc::new(PluginInstance::default())).is_none());
    let mut zero = PluginInstance::default();
    zero.id = Some(0);
    assert!(reg.upsert(Arc::new(zero)).is_none());
    assert!(reg.is_empty());
}

#[test]
fn zero_previous_id_means_no_parent() {
    let mut reg = NodeRegistry::new();
    let node = reg.upsert(inst(1, Some(0), "root")).unwrap();
    assert_eq!(node.parent_id, None);
}

#[test]
fn first_root_wins_and_conflicts_are_counted_once() {
    let mut roots = RootTracker::new();
    assert_eq!(roots.current_root(), None);
    assert_eq!(roots.observe_candidate(3), RootObservation::Accepted);
    assert_eq!(roots.observe_candidate(3), RootObservation::Repeated);
    assert_eq!(
        roots.observe_candidate(8),
        RootObservation::Conflict { existing: 3 }
    );
    assert_eq!(
        roots.observe_candidate(8),
        RootObservation::Conflict { existing: 3 }
    );
    assert_eq!(
        roots.observe_candidate(11),
        RootObservation::Conflict { existing: 3 }
    );

    assert_eq!(roots.current_root(), Some(3));
    assert_eq!(roots.conflicts(), &[8, 11]);
}
