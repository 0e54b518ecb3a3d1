//! The CAN transport service.
//!
//! [`CanService`] holds everything shared between the bus controller's
//! interrupt handlers and the main loop: the hardware channel adapter, both
//! frame queues, the enumeration engine, the diagnostics and the node's CANID.
//! All of it lives behind one `embassy_sync` blocking mutex over a critical
//! section, so the service is `Sync` and can be stored in a `static`. Every
//! entry point holds the lock for one short copy-in/copy-out step only; the
//! receive drain takes it once per frame.
//!
//! [`CanTransport`] is the main-loop handle built by [`CanService::transport`].
//! It owns the CANID store, so non-volatile writes never happen inside a
//! critical section.
//!
//! ```text
//!   interrupt context                 main loop
//!   -----------------                 ---------
//!   on_rx_watermark() ─┐         ┌─ CanTransport::send()
//!   on_tx_complete()  ─┼─ Mutex ─┼─ CanTransport::receive() / poll()
//!   on_error()        ─┤ (Inner) ├─ CanTransport::process_message()
//!   check_tx_timeout()─┘         └─ CanIdStore::persist_identifier() (outside the lock)
//! ```
use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

use crate::error::{SendError, TransmitError};
use crate::protocol::managment::self_enumeration::{
    EnumerationEvent, Observation, SelfEnumeration,
};
use crate::protocol::messages::opcodes::{
    CMDERR_INV_CMD, OPC_CANID, OPC_ENUM, OPC_GRSP, SERVICE_ID_MNS,
};
use crate::protocol::messages::Message;
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::can_id::CanIdentifier;
use crate::protocol::transport::config::CanConfig;
use crate::protocol::transport::diagnostics::{DiagnosticIndex, DiagnosticValue, Diagnostics};
use crate::protocol::transport::frame_queue::FrameQueue;
use crate::protocol::transport::traits::{
    can_id_store::CanIdStore,
    channel_adapter::{ChannelFault, HardwareChannelAdapter},
    tick_source::{Tick, TickSource},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Whether [`CanTransport::process_message`] consumed a message.
pub enum Processed {
    Processed,
    NotProcessed,
}

//==================================================================================INNER
/// State shared between interrupt and main-loop context.
struct Inner<A, const RX: usize, const TX: usize> {
    adapter: A,
    rx_queue: FrameQueue<RX>,
    tx_queue: FrameQueue<TX>,
    enumeration: SelfEnumeration,
    diagnostics: Diagnostics,
    /// Current CANID, 0 until one is allocated.
    can_id: u8,
    /// When the data slot was last loaded.
    tx_started: Option<Tick>,
    arbitration_losses: u8,
}

impl<A: HardwareChannelAdapter, const RX: usize, const TX: usize> Inner<A, RX, TX> {
    fn new(adapter: A) -> Self {
        Self {
            adapter,
            rx_queue: FrameQueue::new(),
            tx_queue: FrameQueue::new(),
            enumeration: SelfEnumeration::new(),
            diagnostics: Diagnostics::new(),
            can_id: 0,
            tx_started: None,
            arbitration_losses: 0,
        }
    }

    //------------------------------------------------------------------receive path
    /// Handle one frame taken from the hardware receive FIFO.
    fn accept_frame(&mut self, frame: &CanFrame, now: Tick) {
        self.diagnostics.increment(DiagnosticIndex::RxMessages);

        if self.enumeration.observe(frame.can_id(), self.can_id, now) == Observation::Conflict {
            self.diagnostics.increment(DiagnosticIndex::CanIdConflicts);
            #[cfg(feature = "defmt")]
            defmt::warn!("CANID {} used by another node, enumeration required", self.can_id);
        }

        if frame.rtr {
            // Enumeration poll: answer with our CANID, if we have one.
            self.enumeration.on_poll_seen(now);
            if self.can_id != 0 {
                self.send_control(&CanFrame::enumeration_response(self.can_id));
            }
            return;
        }

        // Zero-payload replies only feed the enumeration above.
        let Ok(message) = frame.to_message() else {
            return;
        };
        if self.rx_queue.push(message).is_err() {
            self.diagnostics.increment(DiagnosticIndex::RxBufferOverrun);
            #[cfg(feature = "defmt")]
            defmt::warn!("RX queue full, opcode {:#X} dropped", message.opcode());
        }
    }

    //------------------------------------------------------------------transmit path
    fn send(&mut self, message: &Message, now: Tick, config: &CanConfig) -> Result<(), SendError> {
        if self.can_id == 0 && self.enumeration.hold_traffic(now) {
            self.start_enumeration();
        }

        // Straight to hardware only when nothing is waiting ahead of us.
        let submitted = if self.can_id != 0 && self.tx_queue.is_empty() {
            self.submit(message, now)
        } else {
            Err(TransmitError::Busy)
        };
        match submitted {
            Ok(()) => {}
            Err(TransmitError::Unsupported) => return Err(SendError::Unsupported),
            Err(TransmitError::Busy | TransmitError::Bus) => {
                if let Err(full) = self.tx_queue.push(*message) {
                    self.diagnostics.increment(DiagnosticIndex::TxBufferOverrun);
                    #[cfg(feature = "defmt")]
                    defmt::warn!("TX queue full, opcode {:#X} dropped", message.opcode());
                    return Err(full.into());
                }
            }
        }

        if config.consume_own_events && message.is_event() && self.rx_queue.push(*message).is_err() {
            self.diagnostics.increment(DiagnosticIndex::RxBufferOverrun);
        }
        Ok(())
    }

    /// Hand one message to the hardware under the current CANID.
    fn submit(&mut self, message: &Message, now: Tick) -> Result<(), TransmitError> {
        let result = self
            .adapter
            .try_transmit(&CanFrame::from_message(message, self.can_id));
        match result {
            Ok(()) => self.mark_sent(now),
            Err(TransmitError::Busy) => {}
            Err(_) => {
                self.diagnostics.increment(DiagnosticIndex::TxErrors);
                #[cfg(feature = "defmt")]
                defmt::warn!("Transmit of opcode {:#X} refused by the controller", message.opcode());
            }
        }
        result
    }

    /// Move the backlog into the hardware while it accepts frames.
    /// Traffic is held while the node has no CANID.
    fn dispatch(&mut self, now: Tick) {
        if self.can_id == 0 {
            return;
        }
        while let Some(message) = self.tx_queue.peek(0) {
            match self.submit(&message, now) {
                // A frame the controller cannot carry would block the backlog for good.
                Ok(()) | Err(TransmitError::Unsupported) => {
                    self.tx_queue.pop();
                }
                Err(TransmitError::Busy | TransmitError::Bus) => break,
            }
        }
    }

    fn mark_sent(&mut self, now: Tick) {
        self.diagnostics.increment(DiagnosticIndex::TxMessages);
        self.tx_started = Some(now);
        self.arbitration_losses = 0;
    }

    fn transmit_done(&mut self, now: Tick) {
        self.tx_started = None;
        self.arbitration_losses = 0;
        self.dispatch(now);
    }

    fn abort_and_advance(&mut self, now: Tick) {
        self.adapter.abort_transmit();
        self.transmit_done(now);
    }

    fn send_control(&mut self, frame: &CanFrame) {
        if self.adapter.transmit_control(frame).is_err() {
            self.diagnostics.increment(DiagnosticIndex::TxErrors);
        }
    }

    /// Watchdog plus backlog pump for controllers that free their slot
    /// without a completion interrupt.
    fn service_transmit(&mut self, now: Tick, config: &CanConfig) {
        match self.tx_started {
            Some(start) if self.adapter.transmit_pending() => {
                if now.has_expired(start, config.tx_timeout) {
                    self.diagnostics.increment(DiagnosticIndex::TxErrors);
                    #[cfg(feature = "defmt")]
                    defmt::warn!("Transmit timed out after {} ms, aborting", now.since(start));
                    self.abort_and_advance(now);
                }
            }
            _ if !self.adapter.transmit_pending() => self.transmit_done(now),
            _ => {}
        }
    }

    fn handle_fault(&mut self, fault: ChannelFault, now: Tick, config: &CanConfig) {
        #[cfg(feature = "defmt")]
        defmt::debug!("Channel fault: {}", fault);
        match fault {
            ChannelFault::LostArbitration => {
                self.diagnostics.increment(DiagnosticIndex::LostArbitration);
                self.arbitration_losses = self.arbitration_losses.saturating_add(1);
                // The controller retries on its own until we give up on the frame.
                if self.arbitration_losses > config.arbitration_retries {
                    self.abort_and_advance(now);
                }
            }
            ChannelFault::TransmitError => {
                self.diagnostics.increment(DiagnosticIndex::TxErrors);
                self.abort_and_advance(now);
            }
            ChannelFault::ReceiveOverflow => {
                self.diagnostics.increment(DiagnosticIndex::RxBufferOverrun)
            }
            ChannelFault::InvalidMessage => self.diagnostics.increment(DiagnosticIndex::RxErrors),
            ChannelFault::ErrorFrame => {
                self.diagnostics.increment(DiagnosticIndex::ErrorFramesDetected)
            }
        }
    }

    //------------------------------------------------------------------enumeration
    fn start_enumeration(&mut self) {
        self.diagnostics.increment(DiagnosticIndex::CanIdEnumerations);
        #[cfg(feature = "defmt")]
        defmt::info!("Starting CANID enumeration from CANID {}", self.can_id);
        self.send_control(&CanFrame::enumeration_request(self.can_id));
    }

    /// Advance the enumeration timers. Returns a CANID that must be persisted.
    fn advance_enumeration(&mut self, now: Tick, config: &CanConfig) -> Option<CanIdentifier> {
        match self.enumeration.poll(now, config)? {
            EnumerationEvent::Started => {
                self.start_enumeration();
                None
            }
            EnumerationEvent::Completed {
                allocated: Some(id),
                ..
            } => {
                self.set_identifier(id);
                // Releases traffic held while the CANID was 0.
                self.dispatch(now);
                Some(id)
            }
            EnumerationEvent::Completed {
                allocated: None,
                release_tx,
            } => {
                self.diagnostics.increment(DiagnosticIndex::CanIdEnumerationFailures);
                #[cfg(feature = "defmt")]
                defmt::error!("CANID enumeration failed: no free CANID");
                if self.can_id == 0 && (release_tx || !self.tx_queue.is_empty()) {
                    self.enumeration.require_holding_traffic(now);
                }
                None
            }
        }
    }

    fn set_identifier(&mut self, id: CanIdentifier) {
        self.can_id = id.get();
        self.diagnostics.increment(DiagnosticIndex::CanIdChanges);
        #[cfg(feature = "defmt")]
        defmt::info!("CANID set to {}", self.can_id);
    }

    fn request_enumeration(&mut self, now: Tick) {
        if self.can_id == 0 && !self.tx_queue.is_empty() {
            self.enumeration.require_holding_traffic(now);
        } else {
            self.enumeration.require(now);
        }
    }

    //------------------------------------------------------------------diagnostics
    fn diagnostic(&mut self, index: u8) -> Option<DiagnosticValue> {
        let status = u16::from(self.adapter.status());
        self.diagnostics.set(DiagnosticIndex::Status, status);
        self.diagnostics
            .set(DiagnosticIndex::TxBufferUsage, saturate(self.tx_queue.len()));
        self.diagnostics
            .set(DiagnosticIndex::RxBufferUsage, saturate(self.rx_queue.len()));
        self.diagnostics.lookup(index)
    }
}

fn saturate(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}

//==================================================================================SERVICE
/// Interrupt-shared core of the CAN transport.
///
/// `RX` and `TX` are the capacities of the software receive and transmit
/// queues.
pub struct CanService<A, T, const RX: usize, const TX: usize> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Inner<A, RX, TX>>>,
    clock: T,
    config: CanConfig,
}

impl<A, T, const RX: usize, const TX: usize> CanService<A, T, RX, TX>
where
    A: HardwareChannelAdapter,
    T: TickSource,
{
    pub fn new(adapter: A, clock: T, config: CanConfig) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner::new(adapter))),
            clock,
            config,
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner<A, RX, TX>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn config(&self) -> &CanConfig {
        &self.config
    }

    /// Power-up: restore the stored CANID, clear diagnostics and queues, and
    /// hand out the main-loop handle.
    pub fn transport<S: CanIdStore>(&self, mut store: S) -> CanTransport<'_, A, T, S, RX, TX> {
        let can_id = store.load_identifier().map_or(0, CanIdentifier::get);
        self.with(|inner| {
            inner.can_id = can_id;
            inner.diagnostics.reset();
            inner.enumeration.cancel();
            inner.rx_queue.clear();
            inner.tx_queue.clear();
            inner.tx_started = None;
            inner.arbitration_losses = 0;
        });
        #[cfg(feature = "defmt")]
        defmt::info!("CAN service up with CANID {}", can_id);
        CanTransport {
            service: self,
            store,
        }
    }

    /// Receive interrupt (FIFO high watermark): drain the hardware FIFO into
    /// the receive queue, one critical section per frame.
    pub fn on_rx_watermark(&self) {
        let now = self.clock.now();
        while self.with(|inner| match inner.adapter.receive() {
            Some(frame) => {
                inner.accept_frame(&frame, now);
                true
            }
            None => false,
        }) {}
    }

    /// Transmit-complete interrupt: load the next backlog message.
    pub fn on_tx_complete(&self) {
        let now = self.clock.now();
        self.with(|inner| inner.transmit_done(now));
    }

    /// Bus-error interrupt: account for every pending fault.
    pub fn on_error(&self) {
        let now = self.clock.now();
        while self.with(|inner| match inner.adapter.take_fault() {
            Some(fault) => {
                inner.handle_fault(fault, now, &self.config);
                true
            }
            None => false,
        }) {}
    }

    /// Transmit watchdog. Safe from a timer interrupt or the main loop.
    pub fn check_tx_timeout(&self) {
        let now = self.clock.now();
        self.with(|inner| inner.service_transmit(now, &self.config));
    }

    /// Current CANID, 0 while none is allocated.
    pub fn can_identifier(&self) -> u8 {
        self.with(|inner| inner.can_id)
    }

    /// 1-based diagnostic lookup, `None` outside `1..=16`.
    pub fn get_diagnostic(&self, index: u8) -> Option<DiagnosticValue> {
        self.with(|inner| inner.diagnostic(index))
    }

    /// Run `f` against the adapter inside a critical section.
    pub fn with_adapter<R>(&self, f: impl FnOnce(&mut A) -> R) -> R {
        self.with(|inner| f(&mut inner.adapter))
    }
}

//==================================================================================TRANSPORT
/// Main-loop handle of the CAN transport.
pub struct CanTransport<'a, A, T, S, const RX: usize, const TX: usize> {
    service: &'a CanService<A, T, RX, TX>,
    store: S,
}

impl<'a, A, T, S, const RX: usize, const TX: usize> CanTransport<'a, A, T, S, RX, TX>
where
    A: HardwareChannelAdapter,
    T: TickSource,
    S: CanIdStore,
{
    pub fn service(&self) -> &'a CanService<A, T, RX, TX> {
        self.service
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Queue `message` for transmission.
    ///
    /// Never blocks. A message the controller refuses stays in the backlog and
    /// is retried. Fails when the hardware and the software backlog are both
    /// full, or when the controller cannot carry the frame at all; the message
    /// is dropped in both cases.
    pub fn send(&mut self, message: &Message) -> Result<(), SendError> {
        let now = self.service.clock.now();
        let config = &self.service.config;
        self.service.with(|inner| inner.send(message, now, config))
    }

    /// Next message for the application, if any.
    ///
    /// Advances the enumeration timers first, then serves the receive queue,
    /// then the hardware FIFO. Enumeration frames are consumed here.
    pub fn receive(&mut self) -> Option<Message> {
        self.poll();
        let now = self.service.clock.now();
        loop {
            let step = self.service.with(|inner| {
                if let Some(message) = inner.rx_queue.pop() {
                    return Some(Some(message));
                }
                let frame = inner.adapter.receive()?;
                inner.accept_frame(&frame, now);
                Some(None)
            });
            match step {
                Some(Some(message)) => return Some(message),
                Some(None) => continue,
                None => return None,
            }
        }
    }

    /// Drive timers without consuming messages: enumeration, transmit
    /// watchdog, and CANID persistence.
    pub fn poll(&mut self) {
        let now = self.service.clock.now();
        let config = &self.service.config;
        let allocated = self.service.with(|inner| {
            let allocated = inner.advance_enumeration(now, config);
            inner.service_transmit(now, config);
            allocated
        });
        if let Some(id) = allocated {
            self.store.persist_identifier(Some(id));
        }
    }

    /// 1-based diagnostic lookup, `None` outside `1..=16`.
    pub fn get_diagnostic(&self, index: u8) -> Option<DiagnosticValue> {
        self.service.get_diagnostic(index)
    }

    /// Busy-wait until the hardware slot is free and the backlog has been
    /// handed over. Returns at once while the node has no CANID, since held
    /// traffic cannot drain until an enumeration succeeds.
    pub fn wait_for_tx_queue_to_drain(&mut self) {
        loop {
            self.poll();
            let drained = self.service.with(|inner| {
                inner.can_id == 0
                    || (!inner.adapter.transmit_pending() && inner.tx_queue.is_empty())
            });
            if drained {
                return;
            }
            core::hint::spin_loop();
        }
    }

    pub fn can_identifier(&self) -> u8 {
        self.service.can_identifier()
    }

    /// Force a self-enumeration after the usual holdoff.
    pub fn request_enumeration(&mut self) {
        let now = self.service.clock.now();
        self.service.with(|inner| inner.request_enumeration(now));
    }

    /// Set the CANID explicitly and persist it.
    pub fn set_can_identifier(&mut self, id: CanIdentifier) {
        let now = self.service.clock.now();
        self.service.with(|inner| {
            inner.enumeration.cancel();
            inner.set_identifier(id);
            inner.dispatch(now);
        });
        self.store.persist_identifier(Some(id));
    }

    /// Forget the CANID: back to the sentinel, erased from storage.
    pub fn factory_reset(&mut self) {
        self.service.with(|inner| {
            inner.enumeration.cancel();
            inner.can_id = 0;
        });
        self.store.persist_identifier(None);
        #[cfg(feature = "defmt")]
        defmt::info!("CANID cleared by factory reset");
    }

    /// Handle the CAN-specific management opcodes addressed to `node_number`.
    ///
    /// `ENUM` forces a self-enumeration, `CANID` sets the CANID. A `CANID`
    /// without a valid value is answered with a `GRSP` error.
    pub fn process_message(&mut self, message: &Message, node_number: u16) -> Processed {
        if message.node_number() != Some(node_number) {
            return Processed::NotProcessed;
        }
        match message.opcode() {
            OPC_ENUM => {
                self.request_enumeration();
                Processed::Processed
            }
            OPC_CANID => {
                match message.data().get(2).map(|value| CanIdentifier::new(*value)) {
                    Some(Ok(id)) => self.set_can_identifier(id),
                    _ => {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("Rejected CANID request");
                        self.reject(OPC_CANID, node_number);
                    }
                }
                Processed::Processed
            }
            _ => Processed::NotProcessed,
        }
    }

    fn reject(&mut self, opcode: u8, node_number: u16) {
        let response =
            Message::for_node(OPC_GRSP, node_number, &[opcode, SERVICE_ID_MNS, CMDERR_INV_CMD]);
        if let Ok(response) = response {
            self.send(&response).ok();
        }
    }
}
