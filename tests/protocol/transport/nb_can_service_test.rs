//! The CAN service over the generic `embedded_can::nb::Can` back-end, with a
//! driver that owns a small transmit FIFO and raises no completion interrupt.
use std::collections::VecDeque;

use embedded_can::{ErrorKind, nb::Can};
use vlcb_can::protocol::{
    managment::can_service::CanService,
    messages::Message,
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
struct DriverError;

impl embedded_can::Error for DriverError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Driver with a `depth`-frame transmit FIFO.
struct FifoDriver {
    depth: usize,
    tx: VecDeque<CanFrame>,
    rx: VecDeque<CanFrame>,
    /// Bus errors to report before accepting frames again.
    failures: usize,
}

impl Can for FifoDriver {
    type Frame = CanFrame;
    type Error = DriverError;

    fn transmit(&mut self, frame: &CanFrame) -> nb::Result<Option<CanFrame>, DriverError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(nb::Error::Other(DriverError));
        }
        if self.tx.len() >= self.depth {
            return Err(nb::Error::WouldBlock);
        }
        self.tx.push_back(*frame);
        Ok(None)
    }

    fn receive(&mut self) -> nb::Result<CanFrame, DriverError> {
        self.rx.pop_front().ok_or(nb::Error::WouldBlock)
    }
}

struct FixedClock;

impl TickSource for FixedClock {
    fn now(&self) -> Tick {
        Tick(0)
    }
}

struct Store(Option<CanIdentifier>);

impl CanIdStore for Store {
    fn load_identifier(&mut self) -> Option<CanIdentifier> {
        self.0
    }

    fn persist_identifier(&mut self, id: Option<CanIdentifier>) {
        self.0 = id;
    }
}

type Service = CanService<EmbeddedCanAdapter<FifoDriver>, FixedClock, 8, 8>;

fn service() -> Service {
    let driver = FifoDriver {
        depth: 2,
        tx: VecDeque::new(),
        rx: VecDeque::new(),
        failures: 0,
    };
    CanService::new(EmbeddedCanAdapter::new(driver), FixedClock, CanConfig::default())
}

fn message(n: u8) -> Message {
    Message::new(0x90, &[0x01, 0x05, 0x00, n]).unwrap()
}

fn take_sent(service: &Service) -> Vec<CanFrame> {
    service.with_adapter(|adapter| adapter.driver().tx.drain(..).collect())
}

#[test]
/// With no completion interrupt, polling pumps the backlog into the driver.
fn test_poll_pumps_backlog() {
    let service = service();
    let mut transport = service.transport(Store(CanIdentifier::new(5).ok()));

    for n in 0..5 {
        transport.send(&message(n)).unwrap();
    }
    let mut sent = take_sent(&service);
    assert_eq!(sent.len(), 2);

    while sent.len() < 5 {
        transport.poll();
        let batch = take_sent(&service);
        assert!(!batch.is_empty(), "backlog stalled");
        sent.extend(batch);
    }

    let messages: Vec<_> = sent.iter().map(|f| f.to_message().unwrap()).collect();
    assert_eq!(messages, (0..5).map(message).collect::<Vec<_>>());
    assert_eq!(
        service.get_diagnostic(DiagnosticIndex::TxMessages as u8 + 1).map(|v| v.0),
        Some(5)
    );
}

#[test]
/// Polls arriving through the driver are answered through the driver.
fn test_poll_reply_through_driver() {
    let service = service();
    let mut transport = service.transport(Store(CanIdentifier::new(5).ok()));

    service.with_adapter(|adapter| {
        let rx = &mut adapter.driver().rx;
        rx.push_back(CanFrame::enumeration_request(9));
        rx.push_back(CanFrame::from_message(&message(1), 9));
    });
    assert_eq!(transport.receive(), Some(message(1)));
    assert_eq!(take_sent(&service), [CanFrame::enumeration_response(5)]);
}

#[test]
/// A bus error on submission keeps the message queued; it is sent on a later
/// poll and counted once.
fn test_bus_error_retries_message() {
    let service = service();
    let mut transport = service.transport(Store(CanIdentifier::new(5).ok()));
    service.with_adapter(|adapter| adapter.driver().failures = 1);

    assert_eq!(transport.send(&message(0)), Ok(()));
    assert!(take_sent(&service).is_empty());
    let diag = |index: DiagnosticIndex| service.get_diagnostic(index as u8 + 1).map(|v| v.0);
    assert_eq!(diag(DiagnosticIndex::TxMessages), Some(0));
    assert_eq!(diag(DiagnosticIndex::TxErrors), Some(1));
    assert_eq!(diag(DiagnosticIndex::TxBufferUsage), Some(1));

    transport.poll();
    let sent: Vec<_> = take_sent(&service).iter().map(|f| f.to_message().unwrap()).collect();
    assert_eq!(sent, [message(0)]);
    assert_eq!(diag(DiagnosticIndex::TxMessages), Some(1));
    assert_eq!(diag(DiagnosticIndex::TxBufferUsage), Some(0));
}
