//! CAN transport over a simulated segment: backlog ordering, exactly-once
//! hand-over to the hardware, and power-up restore.
#[allow(dead_code)]
mod helpers {
    include!("../../helpers/mod.rs");
}

use helpers::{event, lock, Network, MemoryStore, TX_CAPACITY};
use vlcb_can::{
    error::SendError,
    protocol::transport::{can_id::CanIdentifier, diagnostics::DiagnosticIndex},
};

#[test]
/// Every queued message is handed to the hardware once and crosses the bus
/// once; each receiver sees each sender's messages in submission order.
fn test_no_double_delivery() {
    let mut net = Network::new();
    for id in 1..=3 {
        net.add_node(Some(id));
    }

    // Fill the slot and part of the backlog of every node before the bus runs.
    for node in 0..3 {
        for n in 0..6 {
            net.nodes[node]
                .transport
                .send(&event(0x0100 + node as u16, n))
                .unwrap();
        }
    }
    net.transfer();
    net.run_for(1);

    for (node, sim) in net.nodes.iter().enumerate() {
        let submitted = lock(&sim.port).submitted.len();
        assert_eq!(submitted, 6, "node {node} handed a frame over twice");
        assert_eq!(sim.diagnostic(DiagnosticIndex::TxMessages as u8 + 1), 6);
    }
    for node in 0..3u16 {
        for n in 0..6 {
            let copies = net
                .wire
                .iter()
                .filter_map(|frame| frame.to_message().ok())
                .filter(|m| *m == event(0x0100 + node, n))
                .count();
            assert_eq!(copies, 1);
        }
    }
    for (receiver, sim) in net.nodes.iter().enumerate() {
        for sender in (0..3).filter(|s| *s != receiver) {
            let from_sender: Vec<_> = sim
                .delivered
                .iter()
                .filter(|m| m.node_number() == Some(0x0100 + sender as u16))
                .copied()
                .collect();
            let expected: Vec<_> = (0..6).map(|n| event(0x0100 + sender as u16, n)).collect();
            assert_eq!(from_sender, expected);
        }
    }
}

#[test]
/// The slot plus a full backlog is the most a node holds; the next send fails.
fn test_send_fails_only_when_backlog_full() {
    let mut net = Network::new();
    let node = net.add_node(Some(4));

    for n in 0..=TX_CAPACITY as u16 {
        assert_eq!(net.nodes[node].transport.send(&event(0x0104, n)), Ok(()));
    }
    assert_eq!(
        net.nodes[node].transport.send(&event(0x0104, 99)),
        Err(SendError::QueueFull)
    );
    assert_eq!(
        net.nodes[node].diagnostic(DiagnosticIndex::TxBufferOverrun as u8 + 1),
        1
    );
}

#[test]
/// A stored CANID survives a restart; a cleared store brings back the sentinel.
fn test_restart_restores_stored_identifier() {
    let mut net = Network::new();
    let node = net.add_node(None);
    net.send(node, &event(0x0101, 1)).unwrap();
    net.run_for(101);
    assert_eq!(net.nodes[node].can_id(), 1);
    assert_eq!(net.nodes[node].stored_id(), Some(1));

    // Power-cycle the same hardware with the persisted value.
    let service = net.nodes[node].service;
    let restarted = service.transport(MemoryStore {
        stored: CanIdentifier::new(1).ok(),
        writes: 0,
    });
    assert_eq!(restarted.can_identifier(), 1);
    assert_eq!(restarted.get_diagnostic(DiagnosticIndex::TxMessages as u8 + 1).map(|v| v.0), Some(0));
    drop(restarted);

    let mut reset = service.transport(MemoryStore::default());
    assert_eq!(reset.can_identifier(), 0);
    reset.factory_reset();
    assert_eq!(reset.store().stored, None);
}
