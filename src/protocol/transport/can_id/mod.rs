//! Creation and extraction of the 11-bit standard identifiers used by the
//! VLCB CAN transport, and the node's own CANID.
use crate::error::CanIdError;
use crate::protocol::messages::priority::{Priority, SUPER_PRIORITY_FIELD};

// Define, build, and decompose a VLCB CAN identifier.

//==================================================================================CAN_IDENTIFIER
/// Largest CANID a node may allocate.
pub const MAX_CAN_ID: u8 = 99;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// A CANID owned by a node on the segment, always within `1..=99`.
pub struct CanIdentifier(u8);

impl CanIdentifier {
    /// Validates `value` against the allocatable range.
    pub const fn new(value: u8) -> Result<Self, CanIdError> {
        if value >= 1 && value <= MAX_CAN_ID {
            Ok(Self(value))
        } else {
            Err(CanIdError::OutOfRange { value })
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for CanIdentifier {
    type Error = CanIdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CanIdentifier> for u8 {
    fn from(id: CanIdentifier) -> Self {
        id.0
    }
}

//==================================================================================FRAME_ID
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Encapsulates a standard CAN identifier (11 bits) and exposes accessors
/// for the priority field and the sender's CANID.
///
/// Layout, most significant first: 4-bit priority field, 7-bit CANID.
pub struct FrameId(pub u16);

impl FrameId {
    /// Mask of the 11 meaningful bits.
    pub const MASK: u16 = 0x07FF;

    // Builder entry point
    /// Creates a pre-configured `FrameIdBuilder` for a sender CANID.
    pub fn builder(can_id: u8) -> FrameIdBuilder {
        FrameIdBuilder::new(can_id)
    }

    /// Returns the 4-bit priority field.
    pub fn priority_field(&self) -> u8 {
        ((self.0 >> 7) & 0x0F) as u8
    }

    /// Returns the message priority class, `None` for enumeration traffic.
    pub fn priority(&self) -> Option<Priority> {
        Priority::from_field(self.priority_field())
    }

    /// Seven-bit CANID of the sender (0..=127 on the wire).
    pub fn can_id(&self) -> u8 {
        (self.0 & 0x7F) as u8
    }
}

impl From<FrameId> for embedded_can::StandardId {
    fn from(id: FrameId) -> Self {
        // Masked to 11 bits, always within `StandardId::MAX`.
        embedded_can::StandardId::new(id.0 & FrameId::MASK).unwrap_or(embedded_can::StandardId::ZERO)
    }
}

impl From<embedded_can::StandardId> for FrameId {
    fn from(id: embedded_can::StandardId) -> Self {
        FrameId(id.as_raw())
    }
}

//==================================================================================FRAME_ID_BUILDER
#[derive(Debug)]
/// Fluent builder that masks every field to its width.
pub struct FrameIdBuilder {
    pub priority_field: u8,
    pub can_id: u8,
}

impl FrameIdBuilder {
    /// Initializes the builder for a sender CANID at normal priority.
    pub fn new(can_id: u8) -> Self {
        Self {
            priority_field: Priority::Normal.field(),
            can_id,
        }
    }

    /// Sets the priority class of the carried opcode.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority_field = priority.field();
        self
    }

    /// Uses the reserved enumeration field, which beats every message class.
    pub fn enumeration(mut self) -> Self {
        self.priority_field = SUPER_PRIORITY_FIELD;
        self
    }

    /// Builds the identifier. The CANID keeps only its low seven bits.
    pub fn build(self) -> FrameId {
        FrameId((((self.priority_field & 0x0F) as u16) << 7) | (self.can_id & 0x7F) as u16)
    }
}
