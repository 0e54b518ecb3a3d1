//! VLCB message model: an opcode followed by up to seven data bytes.
//!
//! Messages are plain values copied between queue slots; the transport never
//! holds references into them.
pub mod priority;

use crate::error::FrameError;

/// Opcodes handled or emitted by the CAN service itself.
pub mod opcodes {
    /// Positive acknowledgement, also the neutral value of an empty slot.
    pub const OPC_ACK: u8 = 0x00;
    /// Force a self-enumeration of the CANID.
    pub const OPC_ENUM: u8 = 0x5D;
    /// Set the CANID explicitly.
    pub const OPC_CANID: u8 = 0x75;
    /// Long event ON.
    pub const OPC_ACON: u8 = 0x90;
    /// Long event OFF.
    pub const OPC_ACOF: u8 = 0x91;
    /// Short event ON.
    pub const OPC_ASON: u8 = 0x98;
    /// Generic response to a configuration command.
    pub const OPC_GRSP: u8 = 0xAF;
    /// Node parameter request, a low priority opcode.
    pub const OPC_RQNP: u8 = 0x10;
    /// Emergency stop request, a high priority opcode.
    pub const OPC_RESTP: u8 = 0x0A;
    /// Track halted, a high priority opcode.
    pub const OPC_HLT: u8 = 0x02;

    /// Service identifier of the minimum node service, used in `GRSP` replies.
    pub const SERVICE_ID_MNS: u8 = 1;
    /// `GRSP` result code for an invalid command.
    pub const CMDERR_INV_CMD: u8 = 1;

    const EVENT_SET_MASK: u8 = 0b1001_0000;
    const EVENT_CLR_MASK: u8 = 0b0000_0110;

    /// True when the opcode belongs to the accessory event family (ACON/ACOF/ASON/...).
    pub const fn is_event(opcode: u8) -> bool {
        (opcode & EVENT_SET_MASK) == EVENT_SET_MASK && (!opcode & EVENT_CLR_MASK) == EVENT_CLR_MASK
    }
}

/// Maximum number of data bytes following the opcode.
pub const MAX_DATA_LEN: usize = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
/// A VLCB message: opcode plus up to seven data bytes.
///
/// `len` counts the opcode, so a valid message has `1..=8`; a length of 0 only
/// appears on the zero-payload enumeration frames and never surfaces as a message.
pub struct Message {
    opcode: u8,
    len: u8,
    data: [u8; MAX_DATA_LEN],
}

impl Message {
    /// Build a message from an opcode and its data bytes.
    pub fn new(opcode: u8, data: &[u8]) -> Result<Self, FrameError> {
        if data.len() > MAX_DATA_LEN {
            return Err(FrameError::InvalidLength {
                len: data.len() + 1,
            });
        }
        let mut buffer = [0u8; MAX_DATA_LEN];
        buffer[..data.len()].copy_from_slice(data);
        Ok(Self {
            opcode,
            len: (data.len() + 1) as u8,
            data: buffer,
        })
    }

    /// Rebuild a message from raw fields. A length above 8 is clamped so a
    /// malformed DLC never reads past the data buffer.
    pub const fn from_raw(opcode: u8, len: u8, data: [u8; MAX_DATA_LEN]) -> Self {
        let len = if len > 8 { 8 } else { len };
        Self { opcode, len, data }
    }

    /// Convenience constructor for messages addressed to a node number
    /// (`opcode, NN hi, NN lo, extra...`).
    pub fn for_node(opcode: u8, node_number: u16, extra: &[u8]) -> Result<Self, FrameError> {
        let mut data = [0u8; MAX_DATA_LEN];
        let [hi, lo] = node_number.to_be_bytes();
        data[0] = hi;
        data[1] = lo;
        if extra.len() > MAX_DATA_LEN - 2 {
            return Err(FrameError::InvalidLength {
                len: extra.len() + 3,
            });
        }
        data[2..2 + extra.len()].copy_from_slice(extra);
        Self::new(opcode, &data[..2 + extra.len()])
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// Total length including the opcode (the frame DLC).
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Data bytes following the opcode.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len().saturating_sub(1)]
    }

    /// Raw data buffer, including unused trailing bytes.
    pub fn raw_data(&self) -> &[u8; MAX_DATA_LEN] {
        &self.data
    }

    /// Node number carried in the first two data bytes, if present.
    pub fn node_number(&self) -> Option<u16> {
        match self.data() {
            [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }

    /// True for the accessory event opcodes, candidates for self-consumption.
    pub fn is_event(&self) -> bool {
        opcodes::is_event(self.opcode)
    }
}
