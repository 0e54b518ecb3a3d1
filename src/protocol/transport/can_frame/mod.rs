//! In-memory representation of a VLCB CAN frame.
//!
//! Byte 0 of a data frame is the opcode, bytes 1..=7 its data. Zero-payload
//! frames are enumeration traffic: with RTR set they are the poll, without it
//! they are the reply carrying only the sender's CANID in the identifier.
use crate::error::FrameError;
use crate::protocol::messages::priority::priority_of;
use crate::protocol::messages::{Message, MAX_DATA_LEN};
use crate::protocol::transport::can_id::FrameId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Raw standard CAN frame as exchanged with a hardware channel.
pub struct CanFrame {
    /// 11-bit identifier: priority field and sender CANID.
    pub id: FrameId,
    /// Remote-transmission-request flag.
    pub rtr: bool,
    /// Payload buffer. Classic CAN frames always provide eight bytes.
    pub data: [u8; 8],
    /// Number of valid payload bytes (Data Length Code, 0 to 8).
    pub len: usize,
}

impl CanFrame {
    /// Data frame carrying `message`, sent under `can_id` at the opcode's priority.
    /// The opcode byte is always sent, so a data frame is never mistaken for
    /// enumeration traffic.
    pub fn from_message(message: &Message, can_id: u8) -> Self {
        let id = FrameId::builder(can_id)
            .with_priority(priority_of(message.opcode()))
            .build();
        let mut data = [0u8; 8];
        data[0] = message.opcode();
        data[1..].copy_from_slice(message.raw_data());
        Self {
            id,
            rtr: false,
            data,
            len: message.len().max(1),
        }
    }

    /// Enumeration poll: zero-payload RTR frame at enumeration priority.
    pub fn enumeration_request(can_id: u8) -> Self {
        Self {
            id: FrameId::builder(can_id).enumeration().build(),
            rtr: true,
            data: [0; 8],
            len: 0,
        }
    }

    /// Enumeration reply: zero-payload data frame, the identifier is the answer.
    pub fn enumeration_response(can_id: u8) -> Self {
        Self {
            rtr: false,
            ..Self::enumeration_request(can_id)
        }
    }

    /// Sender CANID.
    pub fn can_id(&self) -> u8 {
        self.id.can_id()
    }

    /// True for zero-payload frames (enumeration polls and replies).
    pub fn is_control(&self) -> bool {
        self.rtr || self.len == 0
    }

    /// Extracts the carried message. A DLC above 8 is clamped.
    pub fn to_message(&self) -> Result<Message, FrameError> {
        if self.is_control() {
            return Err(FrameError::NoOpcode);
        }
        let mut data = [0u8; MAX_DATA_LEN];
        data.copy_from_slice(&self.data[1..]);
        Ok(Message::from_raw(self.data[0], self.len.min(8) as u8, data))
    }
}

impl TryFrom<&CanFrame> for Message {
    type Error = FrameError;

    fn try_from(frame: &CanFrame) -> Result<Self, Self::Error> {
        frame.to_message()
    }
}

//==================================================================================EMBEDDED_CAN
impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<embedded_can::Id>, data: &[u8]) -> Option<Self> {
        let embedded_can::Id::Standard(id) = id.into() else {
            return None;
        };
        if data.len() > 8 {
            return None;
        }
        let mut buffer = [0u8; 8];
        buffer[..data.len()].copy_from_slice(data);
        Some(Self {
            id: id.into(),
            rtr: false,
            data: buffer,
            len: data.len(),
        })
    }

    fn new_remote(id: impl Into<embedded_can::Id>, dlc: usize) -> Option<Self> {
        let embedded_can::Id::Standard(id) = id.into() else {
            return None;
        };
        if dlc > 8 {
            return None;
        }
        Some(Self {
            id: id.into(),
            rtr: true,
            data: [0; 8],
            len: dlc,
        })
    }

    fn is_extended(&self) -> bool {
        false
    }

    fn is_remote_frame(&self) -> bool {
        self.rtr
    }

    fn id(&self) -> embedded_can::Id {
        embedded_can::Id::Standard(self.id.into())
    }

    fn dlc(&self) -> usize {
        self.len
    }

    fn data(&self) -> &[u8] {
        if self.rtr {
            &[]
        } else {
            &self.data[..self.len.min(8)]
        }
    }
}

impl CanFrame {
    /// Converts any `embedded_can::Frame` into a VLCB frame.
    pub fn from_embedded<F: embedded_can::Frame>(frame: &F) -> Result<Self, FrameError> {
        let embedded_can::Id::Standard(id) = frame.id() else {
            return Err(FrameError::ExtendedIdentifier);
        };
        let payload = frame.data();
        if payload.len() > 8 {
            return Err(FrameError::InvalidLength { len: payload.len() });
        }
        let mut data = [0u8; 8];
        data[..payload.len()].copy_from_slice(payload);
        Ok(Self {
            id: id.into(),
            rtr: frame.is_remote_frame(),
            data,
            len: if frame.is_remote_frame() { 0 } else { payload.len() },
        })
    }

    /// Converts into a driver frame type.
    pub fn to_embedded<F: embedded_can::Frame>(&self) -> Option<F> {
        let id = embedded_can::StandardId::from(self.id);
        if self.rtr {
            F::new_remote(id, 0)
        } else {
            F::new(id, &self.data[..self.len.min(8)])
        }
    }
}
