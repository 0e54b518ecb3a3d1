//! Diagnostic counters of the CAN service.
//!
//! Sixteen 16-bit counters indexed by a stable enum. They only move forward
//! (wrapping at `u16::MAX`) and are cleared when the service powers up.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
/// Stable slot numbers of the CAN diagnostics (0-based).
pub enum DiagnosticIndex {
    RxErrors = 0x00,
    TxErrors = 0x01,
    Status = 0x02,
    TxBufferUsage = 0x03,
    TxBufferOverrun = 0x04,
    TxMessages = 0x05,
    RxBufferUsage = 0x06,
    RxBufferOverrun = 0x07,
    RxMessages = 0x08,
    ErrorFramesDetected = 0x09,
    ErrorFramesGenerated = 0x0A,
    LostArbitration = 0x0B,
    CanIdEnumerations = 0x0C,
    CanIdConflicts = 0x0D,
    CanIdChanges = 0x0E,
    CanIdEnumerationFailures = 0x0F,
}

/// Number of diagnostic slots.
pub const NUM_CAN_DIAGNOSTICS: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// A diagnostic value as reported to the management layer.
pub struct DiagnosticValue(pub u16);

impl DiagnosticValue {
    /// Big-endian bytes, as carried in a `DGN` response.
    pub fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

#[derive(Clone, Debug, Default)]
/// Counter storage.
pub struct Diagnostics {
    values: [u16; NUM_CAN_DIAGNOSTICS],
}

impl Diagnostics {
    pub const fn new() -> Self {
        Self {
            values: [0; NUM_CAN_DIAGNOSTICS],
        }
    }

    pub fn increment(&mut self, index: DiagnosticIndex) {
        let slot = &mut self.values[index as usize];
        *slot = slot.wrapping_add(1);
    }

    /// Overwrite a gauge-like slot (status byte, buffer usage).
    pub fn set(&mut self, index: DiagnosticIndex, value: u16) {
        self.values[index as usize] = value;
    }

    pub fn get(&self, index: DiagnosticIndex) -> DiagnosticValue {
        DiagnosticValue(self.values[index as usize])
    }

    /// 1-based lookup used by the management layer. Out-of-range indices
    /// yield `None` instead of reading past the table.
    pub fn lookup(&self, index: u8) -> Option<DiagnosticValue> {
        let slot = usize::from(index).checked_sub(1)?;
        self.values.get(slot).copied().map(DiagnosticValue)
    }

    pub fn reset(&mut self) {
        self.values = [0; NUM_CAN_DIAGNOSTICS];
    }
}
