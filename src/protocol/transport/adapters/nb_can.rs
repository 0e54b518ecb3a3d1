//! Adapter over any non-blocking `embedded_can::nb::Can` driver.
//!
//! Suits controllers with a deep transmit FIFO that schedule frames
//! themselves: the driver accepting a frame means the frame is on its way, so
//! the data slot is never reported as occupied. Frames a driver hands back
//! from `transmit` (displaced by a higher priority frame) are held here and
//! resubmitted before anything newer. At most one frame is parked; while it
//! waits, every new submission is refused with `Busy`.
use embedded_can::{nb::Can, Error as _, ErrorKind};

use crate::error::TransmitError;
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::traits::channel_adapter::{ChannelFault, HardwareChannelAdapter};

const FAULT_KINDS: usize = 5;

/// Wraps a driver implementing `embedded_can::nb::Can`.
pub struct EmbeddedCanAdapter<C: Can> {
    driver: C,
    displaced: Option<C::Frame>,
    faults: [u8; FAULT_KINDS],
}

impl<C: Can> EmbeddedCanAdapter<C> {
    pub fn new(driver: C) -> Self {
        Self {
            driver,
            displaced: None,
            faults: [0; FAULT_KINDS],
        }
    }

    pub fn driver(&mut self) -> &mut C {
        &mut self.driver
    }

    pub fn into_inner(self) -> C {
        self.driver
    }

    fn record(&mut self, fault: ChannelFault) {
        let slot = &mut self.faults[fault_slot(fault)];
        *slot = slot.saturating_add(1);
    }

    fn record_error(&mut self, error: &C::Error) {
        let fault = match error.kind() {
            ErrorKind::Overrun => ChannelFault::ReceiveOverflow,
            ErrorKind::Form | ErrorKind::Crc | ErrorKind::Stuff => ChannelFault::InvalidMessage,
            _ => ChannelFault::ErrorFrame,
        };
        self.record(fault);
    }

    /// Resubmit the parked frame. `false` while a frame is still parked.
    fn flush_displaced(&mut self) -> bool {
        let Some(frame) = self.displaced.take() else {
            return true;
        };
        match self.driver.transmit(&frame) {
            Ok(displaced) => {
                // The driver may hand back another, already accepted frame.
                self.displaced = displaced;
                self.displaced.is_none()
            }
            Err(nb::Error::WouldBlock) => {
                self.displaced = Some(frame);
                false
            }
            Err(nb::Error::Other(error)) => {
                self.record_error(&error);
                self.displaced = Some(frame);
                false
            }
        }
    }

    /// Hand `frame` to the driver. Only called with nothing parked.
    fn submit(&mut self, frame: &CanFrame) -> Result<(), TransmitError> {
        let driver_frame = frame
            .to_embedded::<C::Frame>()
            .ok_or(TransmitError::Unsupported)?;
        match self.driver.transmit(&driver_frame) {
            Ok(displaced) => {
                self.displaced = displaced;
                Ok(())
            }
            Err(nb::Error::WouldBlock) => Err(TransmitError::Busy),
            Err(nb::Error::Other(error)) => {
                self.record_error(&error);
                Err(TransmitError::Bus)
            }
        }
    }
}

fn fault_slot(fault: ChannelFault) -> usize {
    match fault {
        ChannelFault::LostArbitration => 0,
        ChannelFault::TransmitError => 1,
        ChannelFault::ReceiveOverflow => 2,
        ChannelFault::InvalidMessage => 3,
        ChannelFault::ErrorFrame => 4,
    }
}

const FAULTS: [ChannelFault; FAULT_KINDS] = [
    ChannelFault::LostArbitration,
    ChannelFault::TransmitError,
    ChannelFault::ReceiveOverflow,
    ChannelFault::InvalidMessage,
    ChannelFault::ErrorFrame,
];

impl<C: Can> HardwareChannelAdapter for EmbeddedCanAdapter<C> {
    fn try_transmit(&mut self, frame: &CanFrame) -> Result<(), TransmitError> {
        if !self.flush_displaced() {
            return Err(TransmitError::Busy);
        }
        self.submit(frame)
    }

    fn transmit_control(&mut self, frame: &CanFrame) -> Result<(), TransmitError> {
        // Enumeration frames carry the top priority field; the driver's own
        // scheduling puts them ahead of queued data.
        if !self.flush_displaced() {
            return Err(TransmitError::Busy);
        }
        self.submit(frame)
    }

    fn transmit_pending(&self) -> bool {
        self.displaced.is_some()
    }

    fn abort_transmit(&mut self) {
        self.displaced = None;
    }

    fn receive(&mut self) -> Option<CanFrame> {
        loop {
            match self.driver.receive() {
                Ok(frame) => match CanFrame::from_embedded(&frame) {
                    Ok(frame) => return Some(frame),
                    // Extended frames belong to the bootloader, not this transport.
                    Err(_) => continue,
                },
                Err(nb::Error::WouldBlock) => return None,
                Err(nb::Error::Other(error)) => {
                    self.record_error(&error);
                    return None;
                }
            }
        }
    }

    fn take_fault(&mut self) -> Option<ChannelFault> {
        let slot = self.faults.iter().position(|count| *count > 0)?;
        self.faults[slot] -= 1;
        Some(FAULTS[slot])
    }
}

#[cfg(test)]
#[path = "nb_can_tests.rs"]
mod tests;
