//! Two blank nodes sharing a simulated CAN segment: each one sends an event
//! before it has a CANID, self-enumerates, and then delivers the held event.
//!
//! The segment is a pair of in-memory FIFOs behind the generic
//! `embedded_can::nb::Can` back-end, the same adapter a board support crate
//! would wrap around its CAN peripheral driver.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_can::{nb::Can, ErrorKind};
use vlcb_can::protocol::{
    managment::can_service::CanService,
    messages::{opcodes::OPC_ACON, Message},
    transport::{
        adapters::nb_can::EmbeddedCanAdapter,
        can_frame::CanFrame,
        can_id::CanIdentifier,
        config::CanConfig,
        diagnostics::DiagnosticIndex,
        traits::{
            can_id_store::CanIdStore,
            tick_source::{Tick, TickSource},
        },
    },
};

#[derive(Debug)]
struct WireError;

impl embedded_can::Error for WireError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// One end of the segment: frames written here are read by the other end.
struct WireEnd {
    outgoing: Rc<RefCell<VecDeque<CanFrame>>>,
    incoming: Rc<RefCell<VecDeque<CanFrame>>>,
}

impl Can for WireEnd {
    type Frame = CanFrame;
    type Error = WireError;

    fn transmit(&mut self, frame: &CanFrame) -> nb::Result<Option<CanFrame>, WireError> {
        self.outgoing.borrow_mut().push_back(*frame);
        Ok(None)
    }

    fn receive(&mut self) -> nb::Result<CanFrame, WireError> {
        self.incoming
            .borrow_mut()
            .pop_front()
            .ok_or(nb::Error::WouldBlock)
    }
}

#[derive(Clone, Default)]
struct Clock(Rc<Cell<u32>>);

impl TickSource for Clock {
    fn now(&self) -> Tick {
        Tick(self.0.get())
    }
}

/// Stand-in for EEPROM.
#[derive(Default)]
struct Eeprom(Option<CanIdentifier>);

impl CanIdStore for Eeprom {
    fn load_identifier(&mut self) -> Option<CanIdentifier> {
        self.0
    }

    fn persist_identifier(&mut self, id: Option<CanIdentifier>) {
        println!("  [eeprom] CANID persisted: {:?}", id.map(CanIdentifier::get));
        self.0 = id;
    }
}

fn main() {
    println!("=== Two-node CANID self-enumeration ===\n");

    let a_to_b = Rc::new(RefCell::new(VecDeque::new()));
    let b_to_a = Rc::new(RefCell::new(VecDeque::new()));
    let clock = Clock::default();

    let node_a: CanService<_, _, 8, 8> = CanService::new(
        EmbeddedCanAdapter::new(WireEnd {
            outgoing: a_to_b.clone(),
            incoming: b_to_a.clone(),
        }),
        clock.clone(),
        CanConfig::default(),
    );
    let node_b: CanService<_, _, 8, 8> = CanService::new(
        EmbeddedCanAdapter::new(WireEnd {
            outgoing: b_to_a,
            incoming: a_to_b,
        }),
        clock.clone(),
        CanConfig::default(),
    );
    let mut a = node_a.transport(Eeprom::default());
    let mut b = node_b.transport(Eeprom::default());

    println!("1. Both nodes send before owning a CANID:");
    let from_a = Message::for_node(OPC_ACON, 0x0101, &[0x00, 0x01]).expect("event fits");
    let from_b = Message::for_node(OPC_ACON, 0x0102, &[0x00, 0x02]).expect("event fits");
    a.send(&from_a).expect("queued");
    b.send(&from_b).expect("queued");
    println!("  CANIDs: a={} b={}\n", a.can_identifier(), b.can_identifier());

    println!("2. Main loop, one pass per millisecond:");
    for ms in 1..=150u32 {
        clock.0.set(ms);
        // Interrupt side drains the receive FIFO, then the main loop runs.
        node_a.on_rx_watermark();
        while let Some(message) = a.receive() {
            println!("  t={ms:>3} ms  a received {:#04X} {:02X?}", message.opcode(), message.data());
        }
        node_b.on_rx_watermark();
        while let Some(message) = b.receive() {
            println!("  t={ms:>3} ms  b received {:#04X} {:02X?}", message.opcode(), message.data());
        }
    }

    println!("\n3. Result:");
    println!("  CANIDs: a={} b={}", a.can_identifier(), b.can_identifier());
    let enumerations = DiagnosticIndex::CanIdEnumerations as u8 + 1;
    println!(
        "  Enumerations: a={:?} b={:?}",
        a.get_diagnostic(enumerations).map(|v| v.0),
        b.get_diagnostic(enumerations).map(|v| v.0)
    );
}
