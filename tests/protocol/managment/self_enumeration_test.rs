//! CANID self-enumeration on a simulated segment: first allocation, joining
//! a populated bus, conflict recovery, exhaustion, and uniqueness.
#[allow(dead_code)]
mod helpers {
    include!("../../helpers/mod.rs");
}

use helpers::{event, Lcg, Network};
use vlcb_can::protocol::transport::diagnostics::DiagnosticIndex;

fn index(diagnostic: DiagnosticIndex) -> u8 {
    diagnostic as u8 + 1
}

fn assert_unique(ids: &[u8]) {
    for (i, a) in ids.iter().enumerate() {
        assert!((1..=99).contains(a), "node {i} has no valid CANID: {ids:?}");
        for b in &ids[i + 1..] {
            assert_ne!(a, b, "duplicate CANID: {ids:?}");
        }
    }
}

#[test]
/// Two blank nodes send in the same tick: both poll, both end up with
/// distinct CANIDs and both messages get through.
fn test_two_blank_nodes_send_together() {
    let mut net = Network::new();
    let a = net.add_node(None);
    let b = net.add_node(None);

    net.send(a, &event(0x0101, 1)).unwrap();
    net.send(b, &event(0x0102, 1)).unwrap();
    assert_eq!(net.can_ids(), [0, 0]);
    assert!(
        net.wire.iter().all(|frame| frame.rtr && frame.can_id() == 0),
        "only polls while no CANID is held"
    );

    net.run_for(101);
    assert_eq!(net.can_ids(), [1, 2]);
    net.run_for(1);
    assert_eq!(net.nodes[a].delivered, [event(0x0102, 1)]);
    assert_eq!(net.nodes[b].delivered, [event(0x0101, 1)]);
    for node in &net.nodes {
        assert_eq!(node.stored_id(), Some(node.can_id()));
    }
}

#[test]
/// A ninth node joining CANIDs 1 to 8 takes 9 once the window closes.
fn test_ninth_node_takes_next_free_id() {
    let mut net = Network::new();
    for id in 1..=8 {
        net.add_node(Some(id));
    }
    let newcomer = net.add_node(None);

    net.send(newcomer, &event(0x0109, 7)).unwrap();
    let replies = net.wire.iter().filter(|f| !f.rtr && f.len == 0).count();
    assert_eq!(replies, 8);

    net.run_for(100);
    assert_eq!(net.nodes[newcomer].can_id(), 0);
    net.run_for(1);
    assert_eq!(net.nodes[newcomer].can_id(), 9);
    net.run_for(1);
    for node in &net.nodes[..8] {
        assert_eq!(node.delivered, [event(0x0109, 7)]);
    }
}

#[test]
/// A frame under our own CANID: one conflict, holdoff, collection, new CANID.
fn test_conflict_recovery() {
    let mut net = Network::new();
    let a = net.add_node(Some(5));
    let b = net.add_node(Some(5));

    net.send(a, &event(0x0101, 1)).unwrap();
    assert_eq!(net.nodes[b].diagnostic(index(DiagnosticIndex::CanIdConflicts)), 1);

    // Holdoff (200 ms) then collection (100 ms), both strict.
    net.run_for(200);
    assert_eq!(net.nodes[b].diagnostic(index(DiagnosticIndex::CanIdEnumerations)), 0);
    net.run_for(1);
    assert_eq!(net.nodes[b].diagnostic(index(DiagnosticIndex::CanIdEnumerations)), 1);
    net.run_for(100);
    assert_eq!(net.nodes[b].can_id(), 5);
    net.run_for(1);
    assert_eq!(net.nodes[b].can_id(), 1);
    assert_eq!(net.nodes[b].diagnostic(index(DiagnosticIndex::CanIdConflicts)), 1);

    // The poll under CANID 5 made `a` re-enumerate as well.
    net.run_for(1000);
    assert_unique(&net.can_ids());
    assert_eq!(net.nodes[a].diagnostic(index(DiagnosticIndex::CanIdConflicts)), 1);
}

#[test]
/// With CANIDs 1 to 99 taken, a blank node fails to allocate, keeps the
/// sentinel and never transmits data.
fn test_full_bus_allocation_fails() {
    let mut net = Network::new();
    for id in 1..=99 {
        net.add_node(Some(id));
    }
    let late = net.add_node(None);

    net.send(late, &event(0x0100, 1)).unwrap();
    net.run_for(101);

    let node = &net.nodes[late];
    assert_eq!(node.diagnostic(index(DiagnosticIndex::CanIdEnumerationFailures)), 1);
    assert_eq!(node.can_id(), 0);
    assert!(net.wire.iter().all(|frame| frame.can_id() != 0 || frame.is_control()));
    assert!(net.nodes[..99].iter().all(|n| n.delivered.is_empty()));
}

#[test]
/// Many nodes booting with clashing stored CANIDs settle on distinct ones.
fn test_clashing_population_converges() {
    let mut rng = Lcg(0x5EED);
    let mut net = Network::new();
    for _ in 0..12 {
        let stored = rng.next_below(4) as u8 + 1;
        net.add_node(Some(stored));
    }
    let mut schedule: Vec<(u32, usize)> = (0..12).map(|node| (rng.next_below(50), node)).collect();
    schedule.sort();

    for ms in 0..50 {
        for (_, node) in schedule.iter().filter(|(at, _)| *at == ms) {
            net.send(*node, &event(0x0100 + *node as u16, 1)).unwrap();
        }
        net.run_for(1);
    }
    net.run_for(20_000);
    let settled = net.can_ids();
    assert_unique(&settled);

    net.run_for(2_000);
    assert_eq!(net.can_ids(), settled, "CANIDs must be stable once unique");
}

#[test]
/// Blank nodes powering up together all get distinct CANIDs and deliver
/// their held message exactly once.
fn test_blank_population_delivers_held_traffic() {
    let mut net = Network::new();
    for _ in 0..20 {
        net.add_node(None);
    }
    for node in 0..20 {
        net.send(node, &event(0x0100 + node as u16, 1)).unwrap();
    }
    net.run_for(500);

    assert_unique(&net.can_ids());
    for (receiver, node) in net.nodes.iter().enumerate() {
        let mut expected: Vec<_> = (0..20)
            .filter(|sender| *sender != receiver)
            .map(|sender| event(0x0100 + sender as u16, 1))
            .collect();
        let mut delivered = node.delivered.clone();
        expected.sort_by_key(|m| m.node_number());
        delivered.sort_by_key(|m| m.node_number());
        assert_eq!(delivered, expected);
    }
}
