//! Error definitions shared across library modules.
//! Each type models a specific failure scenario (identifier range, frame shape,
//! queue capacity, hardware slot availability). None of them is fatal to the
//! node: the transport resolves them locally and records a diagnostic.
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors raised while building a CAN identifier for this node.
pub enum CanIdError {
    /// Value 0 is the pre-allocation sentinel, values above 99 are reserved.
    #[error("CANID out of range: {value}")]
    OutOfRange { value: u8 },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors raised while converting between raw CAN frames and messages.
pub enum FrameError {
    /// Classic CAN frames carry at most eight bytes.
    #[error("Invalid frame length: {len}")]
    InvalidLength { len: usize },
    /// VLCB traffic only uses 11-bit identifiers.
    #[error("Extended identifiers are not part of the VLCB transport")]
    ExtendedIdentifier,
    /// Zero-payload frames are enumeration traffic, not messages.
    #[error("Frame carries no opcode")]
    NoOpcode,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// A frame queue has no free slot left.
#[error("Frame queue is full")]
pub struct QueueFull;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors reported by a hardware channel adapter when handing it a frame.
pub enum TransmitError {
    /// Every hardware transmit slot is occupied.
    #[error("All hardware transmit slots are busy")]
    Busy,
    /// The controller reported a bus error; the frame was not accepted.
    #[error("Bus error while submitting frame")]
    Bus,
    /// The controller cannot represent the frame.
    #[error("Frame not supported by the controller")]
    Unsupported,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors returned to the application by `CanTransport::send`.
pub enum SendError {
    /// Hardware and software transmit capacity are both exhausted; the message was dropped.
    #[error("Transmit queue overrun: message dropped")]
    QueueFull,
    /// The hardware channel cannot carry the message; it was dropped.
    #[error("Message not supported by the hardware channel")]
    Unsupported,
}

impl From<QueueFull> for SendError {
    fn from(_: QueueFull) -> Self {
        SendError::QueueFull
    }
}
