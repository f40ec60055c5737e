mod common;

use common::{grid_with_blocks, init_tracing, recorded, KEY, LINK};
use gridgroup_core::testing::HookEvent;
use gridgroup_core::{Channel, ChannelRegistry, LinkType, Topology};

#[test]
fn linking_grids_introduces_both_sides() {
    init_tracing();
    let mut topo = Topology::new();
    let (g1, left) = grid_with_blocks(&mut topo, "g1", &["a", "b"]);
    let (g2, right) = grid_with_blocks(&mut topo, "g2", &["c"]);
    let (_ha, log_a) = recorded(&left[0]);
    let (_hb, log_b) = recorded(&left[1]);
    let (hc, log_c) = recorded(&right[0]);
    log_a.clear();
    log_b.clear();

    topo.connect(&g1, &g2, LINK).unwrap();

    let c = right[0].id();
    assert_eq!(log_a.count(&HookEvent::PeerEntered(c)), 1);
    assert_eq!(log_b.count(&HookEvent::PeerEntered(c)), 1);
    assert_eq!(log_c.count_matching(|e| matches!(e, HookEvent::PeerEntered(_))), 0);
    assert_eq!(hc.peer_count(), 2);
    assert_eq!(hc.group(), g1.group(LINK));
}

#[test]
fn unlinking_grids_reports_left_once_per_peer() {
    init_tracing();
    let mut topo = Topology::new();
    let (g1, left) = grid_with_blocks(&mut topo, "g1", &["a", "b"]);
    let (g2, right) = grid_with_blocks(&mut topo, "g2", &["c"]);
    topo.connect(&g1, &g2, LINK).unwrap();
    let (_ha, log_a) = recorded(&left[0]);
    let (_hb, log_b) = recorded(&left[1]);
    let (hc, _log_c) = recorded(&right[0]);
    log_a.clear();
    log_b.clear();

    topo.disconnect(&g1, &g2, LINK).unwrap();

    let c = right[0].id();
    // The group first reports g2 leaving, then c's channel moves out.
    assert_eq!(
        log_a.events(),
        vec![HookEvent::GridRemoved(g2.id()), HookEvent::PeerLeft(c)]
    );
    assert_eq!(log_b.count(&HookEvent::PeerLeft(c)), 1);
    assert_eq!(hc.peer_count(), 0);
    assert_eq!(hc.group(), g2.group(LINK));
}

#[test]
fn removing_a_block_closes_its_channel() {
    init_tracing();
    let mut topo = Topology::new();
    let (g1, blocks) = grid_with_blocks(&mut topo, "g1", &["a", "b", "c"]);
    let (ha, _) = recorded(&blocks[0]);
    let (_hb, log_b) = recorded(&blocks[1]);
    let (_hc, log_c) = recorded(&blocks[2]);
    log_b.clear();
    log_c.clear();

    topo.remove_block(&blocks[0]).unwrap();

    assert!(!ha.is_active());
    assert_eq!(log_b.events(), vec![HookEvent::PeerLeft(blocks[0].id())]);
    assert_eq!(log_c.events(), vec![HookEvent::PeerLeft(blocks[0].id())]);
    assert_eq!(ChannelRegistry::<u32>::member_ids(&g1.group(LINK).unwrap(), KEY).len(), 2);
}

#[test]
fn unrelated_link_type_changes_are_not_channel_events() {
    init_tracing();
    let mut topo = Topology::new();
    let (g1, left) = grid_with_blocks(&mut topo, "g1", &["a"]);
    let (g2, right) = grid_with_blocks(&mut topo, "g2", &["b"]);
    let (_ha, log_a) = recorded(&left[0]);
    let (_hb, log_b) = recorded(&right[0]);

    topo.connect(&g1, &g2, LinkType::Electrical).unwrap();
    topo.disconnect(&g1, &g2, LinkType::Electrical).unwrap();

    assert!(log_a.is_empty());
    assert!(log_b.is_empty());
}

#[test]
fn ghost_blocks_get_no_channel() {
    let mut topo = Topology::new();
    let ghost = topo.create_ghost_grid("projection");
    let block = topo.add_block(&ghost, "preview").unwrap();
    assert!(Channel::<u32>::attach(&block, LINK, KEY, 0, ()).is_none());
}

#[test]
fn snapshot_counts_channel_entries() {
    let mut topo = Topology::new();
    let (g1, blocks) = grid_with_blocks(&mut topo, "g1", &["a"]);
    let (ha, _) = recorded(&blocks[0]);
    let group = g1.group(LINK).unwrap();

    let snap = topo.snapshot();
    let entry = snap.groups.iter().find(|g| g.id == group.id()).unwrap();
    assert_eq!(entry.variables, 1);

    ha.close();
    let snap = topo.snapshot();
    let entry = snap.groups.iter().find(|g| g.id == group.id()).unwrap();
    assert_eq!(entry.variables, 0);
}
