//! Minimal abstraction over a CAN controller's transmit slots and receive FIFO.
//! Allows the transport to plug into various peripherals (single-buffer
//! controllers, deep-FIFO controllers, desktop drivers, simulated buses).
use crate::error::TransmitError;
use crate::protocol::transport::can_frame::CanFrame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Conditions reported by the controller outside the normal data path.
pub enum ChannelFault {
    /// The frame in the data slot lost arbitration; the controller retries it.
    LostArbitration,
    /// The frame in the data slot hit a bus error.
    TransmitError,
    /// The hardware receive FIFO overflowed and frames were lost.
    ReceiveOverflow,
    /// A malformed frame was received.
    InvalidMessage,
    /// An error frame was seen on the bus.
    ErrorFrame,
}

/// Contract the transport uses to drive the hardware.
///
/// The data slot carries application messages; the control slot carries the
/// enumeration poll and reply so they never wait behind a stuck data frame.
/// All methods are non-blocking and are called inside a critical section.
pub trait HardwareChannelAdapter {
    /// Hand a data frame to a free transmit slot.
    fn try_transmit(&mut self, frame: &CanFrame) -> Result<(), TransmitError>;

    /// Hand an enumeration frame to the high-priority control slot.
    fn transmit_control(&mut self, frame: &CanFrame) -> Result<(), TransmitError>;

    /// True while no further data frame can be accepted.
    fn transmit_pending(&self) -> bool;

    /// Abandon the frame occupying the data slot.
    fn abort_transmit(&mut self);

    /// Next frame from the hardware receive FIFO.
    fn receive(&mut self) -> Option<CanFrame>;

    /// Next pending fault, cleared as it is returned.
    fn take_fault(&mut self) -> Option<ChannelFault> {
        None
    }

    /// Controller status byte reported through the diagnostics.
    fn status(&self) -> u8 {
        0
    }

    /// Drain the hardware receive FIFO.
    fn drain_received(&mut self) -> DrainReceived<'_, Self>
    where
        Self: Sized,
    {
        DrainReceived { adapter: self }
    }
}

/// Iterator returned by [`HardwareChannelAdapter::drain_received`].
pub struct DrainReceived<'a, A: HardwareChannelAdapter> {
    adapter: &'a mut A,
}

impl<A: HardwareChannelAdapter> Iterator for DrainReceived<'_, A> {
    type Item = CanFrame;

    fn next(&mut self) -> Option<Self::Item> {
        self.adapter.receive()
    }
}
