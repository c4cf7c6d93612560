use std::collections::BTreeSet;
use std::sync::Arc;

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use feedtree_core::tree::{
    Anomaly, BatchIntegrator, InstanceId, PluginInstance, RootedTreeSnapshot, TreeNode,
};

fn inst(id: u64, prev: Option<u64>) -> PluginInstance {
    PluginInstance::new(id, prev).with_title(format!("inst-{id}"))
}

fn edges(node: &TreeNode<PluginInstance>, out: &mut BTreeSet<(InstanceId, InstanceId)>) {
    for c in &node.children {
        out.insert((node.id, c.id));
        edges(c, out);
    }
}

fn snapshot_edges(snap: &RootedTreeSnapshot<PluginInstance>) -> BTreeSet<(InstanceId, InstanceId)> {
    let mut out = BTreeSet::new();
    if let Some(root) = snap.root() {
        edges(root, &mut out);
    }
    out
}

/// 1 -> {2, 3}, 2 -> {4, 5}, 3 -> {6}, 6 -> {7, 8}
fn sample_feed() -> Vec<PluginInstance> {
    vec![
        inst(1, None),
        inst(2, Some(1)),
        inst(3, Some(1)),
        inst(4, Some(2)),
        inst(5, Some(2)),
        inst(6, Some(3)),
        inst(7, Some(6)),
        inst(8, Some(6)),
    ]
}

#[test]
fn two_pages_out_of_order_build_the_expected_tree() {
    let mut tree = BatchIntegrator::new();
    tree.apply_batch(vec![inst(5, Some(3)), inst(3, None)]);
    tree.apply_batch(vec![inst(7, Some(5))]);

    assert_eq!(tree.current_root(), Some(3));
    let snap = tree.snapshot();
    let root = snap.root().expect("root");
    assert_eq!(root.id, 3);
    assert_eq!(root.children.len(), 1);
    let five = &root.children[0];
    assert_eq!(five.id, 5);
    assert_eq!(five.children.len(), 1);
    assert_eq!(five.children[0].id, 7);
    assert!(five.children[0].children.is_empty());
}

#[test]
fn any_permutation_yields_the_same_edges() {
    let expected = {
        let mut tree = BatchIntegrator::new();
        tree.apply_batch(sample_feed());
        snapshot_edges(&tree.snapshot())
    };
    assert_eq!(expected.len(), 7);

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..25 {
        let mut records = sample_feed();
        records.shuffle(&mut rng);
        let mut tree = BatchIntegrator::new();
        // split into uneven pages as well
        let (a, b) = records.split_at(3);
        tree.apply_batch(b.to_vec());
        tree.apply_batch(a.to_vec());
        assert_eq!(snapshot_edges(&tree.snapshot()), expected);
        assert_eq!(tree.current_root(), Some(1));
    }
}

#[test]
fn extra_parentless_records_are_flagged_not_fatal() {
    let mut tree = BatchIntegrator::new();
    let report = tree.apply_batch(vec![inst(1, None), inst(2, None), inst(3, Some(1)), inst(4, None)]);
    assert_eq!(report.integrated, 4);
    tree.apply_batch(vec![inst(2, None)]);

    assert_eq!(tree.current_root(), Some(1));
    let conflicts: Vec<_> = tree
        .anomalies()
        .iter()
        .filter(|a| matches!(a, Anomaly::RootConflict { .. }))
        .cloned()
        .collect();
    assert_eq!(
        conflicts,
        vec![
            Anomaly::RootConflict { existing: 1, candidate: 2 },
            Anomaly::RootConflict { existing: 1, candidate: 4 },
        ]
    );
    assert_eq!(tree.snapshot().root().unwrap().ids(), vec![1, 3]);
}

#[test]
fn child_before_parent_goes_through_a_placeholder() {
    let mut tree = BatchIntegrator::new();
    tree.apply_batch(vec![inst(2, Some(1))]);
    assert!(tree.registry().get(1).unwrap().is_placeholder());
    assert!(tree.snapshot().is_empty(), "no root known yet");

    tree.apply_batch(vec![inst(1, None)]);
    let snap = tree.snapshot();
    let root = snap.root().unwrap();
    assert_eq!(root.display_name, "inst-1");
    assert!(!root.is_placeholder());
    assert_eq!(root.children[0].id, 2);
}

#[test]
fn unchanged_tree_keeps_its_identity() {
    let mut tree = BatchIntegrator::new();
    tree.apply_batch(sample_feed());
    let first = tree.snapshot();
    let second = tree.snapshot();
    assert!(first.same_as(&second));

    // an empty batch is not a change either
    tree.apply_batch(Vec::<PluginInstance>::new());
    assert!(first.same_as(&tree.snapshot()));
}

#[test]
fn only_the_changed_branch_gets_new_nodes() {
    let mut tree = BatchIntegrator::new();
    tree.apply_batch(sample_feed());
    let before = tree.snapshot();
    let old_root = before.root().unwrap().clone();

    tree.apply_batch(vec![inst(9, Some(4))]);
    let after = tree.snapshot();
    let new_root = after.root().unwrap();

    assert!(!before.same_as(&after));
    // branch 1 -> 2 -> 4 changed
    assert!(!Arc::ptr_eq(&old_root.children[0], &new_root.children[0]));
    assert!(!Arc::ptr_eq(
        old_root.children[0].child(4).unwrap(),
        new_root.children[0].child(4).unwrap()
    ));
    // siblings kept
    assert!(Arc::ptr_eq(&old_root.children[1], &new_root.children[1]));
    assert!(Arc::ptr_eq(
        old_root.children[0].child(5).unwrap(),
        new_root.children[0].child(5).unwrap()
    ));
}

#[test]
fn redelivered_record_with_new_parent_moves() {
    let mut tree = BatchIntegrator::new();
    tree.apply_batch(sample_feed());
    tree.apply_batch(vec![inst(5, Some(3))]);

    let snap = tree.snapshot();
    let root = snap.root().unwrap();
    assert_eq!(root.child(2).unwrap().children.iter().map(|c| c.id).collect::<Vec<_>>(), vec![4]);
    assert_eq!(root.child(3).unwrap().children.iter().map(|c| c.id).collect::<Vec<_>>(), vec![6, 5]);
    assert!(tree.anomalies().contains(&Anomaly::Reparented {
        id: 5,
        from: Some(2),
        to: Some(3),
    }));
    assert_eq!(snap.node_count(), 8);
}

#[test]
fn malformed_records_are_skipped() {
    let mut tree = BatchIntegrator::new();
    let report = tree.apply_batch(vec![inst(1, None), PluginInstance::default(), inst(2, Some(1))]);
    assert_eq!(report.integrated, 2);
    assert_eq!(report.skipped, 1);
    assert!(matches!(tree.anomalies()[0], Anomaly::MalformedRecord { .. }));
    assert_eq!(tree.snapshot().node_count(), 2);
}

#[test]
fn cycles_are_cut_and_reported() {
    let mut tree = BatchIntegrator::new();
    tree.apply_batch(vec![inst(1, None), inst(2, Some(1)), inst(3, Some(3))]);
    assert!(tree.anomalies().contains(&Anomaly::Cycle { id: 3 }));
    assert_eq!(tree.snapshot().node_count(), 2);

    // 2 re-parented under 4, 4 under 2: a loop hanging off nothing
    let mut looped = BatchIntegrator::new();
    looped.apply_batch(vec![inst(1, None), inst(2, Some(1)), inst(4, Some(2))]);
    looped.apply_batch(vec![inst(2, Some(4))]);
    let snap = looped.snapshot();
    assert_eq!(snap.root().unwrap().ids(), vec![1]);
}

#[test]
fn take_anomalies_drains() {
    let mut tree = BatchIntegrator::new();
    tree.apply_batch(vec![inst(1, None), inst(2, None)]);
    assert_eq!(tree.take_anomalies().len(), 1);
    assert!(tree.anomalies().is_empty());
}

#[test]
fn identical_redelivery_keeps_the_snapshot() {
    let mut tree = BatchIntegrator::new();
    let page = sample_feed();
    tree.apply_batch(page.clone());
    let first = tree.snapshot();

    // a retried page changes nothing
    tree.apply_batch(page);
    let second = tree.snapshot();
    assert!(first.same_as(&second));
    assert!(tree.anomalies().is_empty());

    // a real change to one record still shows up, and only on its branch
    tree.apply_batch(vec![inst(7, Some(6)).with_plugin("pl-mri-preview", "1.0.0")]);
    let third = tree.snapshot();
    assert!(!second.same_as(&third));
    let (old_root, new_root) = (second.root().unwrap(), third.root().unwrap());
    assert!(Arc::ptr_eq(old_root.child(2).unwrap(), new_root.child(2).unwrap()));
    assert!(!Arc::ptr_eq(old_root.child(3).unwrap(), new_root.child(3).unwrap()));
}

#[test]
fn deep_chain_builds_without_recursion() {
    let n = 5_000u64;
    let chain: Vec<PluginInstance> = (1..=n)
        .map(|id| inst(id, if id == 1 { None } else { Some(id - 1) }))
        .collect();

    let mut tree = BatchIntegrator::new();
    tree.apply_batch(chain.into_iter().rev());
    let snap = tree.snapshot();
    let root = snap.root().unwrap();
    assert_eq!(snap.node_count(), n as usize);
    assert_eq!(root.depth(), n as usize);
    assert_eq!(snap.find(n).unwrap().id, n);
    assert_eq!(root.ids().len(), n as usize);

    // growing the tip rebuilds the whole spine and drops the old one
    tree.apply_batch(vec![inst(n + 1, Some(n))]);
    drop(snap);
    assert_eq!(tree.snapshot().node_count(), n as usize + 1);
}
