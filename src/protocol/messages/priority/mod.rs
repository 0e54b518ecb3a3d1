//! Opcode → CAN priority class mapping.
//!
//! Every VLCB opcode has a fixed priority class. The class selects the 4-bit
//! priority field written ahead of the CANID in the 11-bit frame identifier, so
//! more urgent traffic wins bus arbitration (lower value wins).

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Arbitration class of an opcode, from least to most urgent.
pub enum Priority {
    Low,
    Normal,
    Above,
    High,
}

impl Priority {
    /// 4-bit priority field (major priority in the upper two bits, minor in the lower two).
    pub const fn field(self) -> u8 {
        match self {
            Priority::Low => 0b0111,
            Priority::Normal => 0b0110,
            Priority::Above => 0b0101,
            Priority::High => 0b0100,
        }
    }

    /// Decode a 4-bit priority field. `None` for the reserved values, including
    /// the enumeration ("super") field 0.
    pub const fn from_field(field: u8) -> Option<Self> {
        match field & 0x0F {
            0b0111 => Some(Priority::Low),
            0b0110 => Some(Priority::Normal),
            0b0101 => Some(Priority::Above),
            0b0100 => Some(Priority::High),
            _ => None,
        }
    }
}

/// Priority field reserved for enumeration polls and replies. It beats every
/// message class so enumeration completes within its collection window.
pub const SUPER_PRIORITY_FIELD: u8 = 0b0000;

use self::Priority::{Above as A, High as H, Low as L};

// Opcodes whose class differs from `Normal`.
const OVERRIDES: &[(u8, Priority)] = &[
    (0x02, H), // HLT
    (0x03, A), // BON
    (0x04, A), // TOF
    (0x05, A), // TON
    (0x06, A), // ESTOP
    (0x07, H), // ARST
    (0x08, A), // RTOF
    (0x09, A), // RTON
    (0x0A, H), // RESTP
    (0x0D, L), // QNN
    (0x10, L), // RQNP
    (0x42, L), // SNN
    (0x4C, L), // SSTAT
    (0x4F, L), // NNRSM
    (0x50, L), // RQNN
    (0x51, L), // NNREL
    (0x52, L), // NNACK
    (0x53, L), // NNLRN
    (0x54, L), // NNULN
    (0x55, L), // NNCLR
    (0x56, L), // NNEVN
    (0x57, L), // NERD
    (0x58, L), // RQEVN
    (0x59, L), // WRACK
    (0x5A, L), // RQDAT
    (0x5B, L), // RQDDS
    (0x5C, L), // BOOT
    (0x5D, L), // ENUM
    (0x5E, L), // NNRST
    (0x5F, L), // EXTC1
    (0x66, H), // SQU
    (0x6F, L), // CMDERR
    (0x70, L), // EVNLF
    (0x71, L), // NVRD
    (0x72, L), // NENRD
    (0x73, L), // RQNPN
    (0x74, L), // NUMEV
    (0x75, L), // CANID
    (0x76, L), // MODE
    (0x78, L), // RQSD
    (0x7F, L), // EXTC2
    (0x87, L), // RDGN
    (0x8E, L), // NVSETRD
    (0x90, L), // ACON
    (0x91, L), // ACOF
    (0x92, L), // AREQ
    (0x93, L), // ARON
    (0x94, L), // AROF
    (0x95, L), // EVULN
    (0x96, L), // NVSET
    (0x97, L), // NVANS
    (0x98, L), // ASON
    (0x99, L), // ASOF
    (0x9A, L), // ASRQ
    (0x9B, L), // PARAN
    (0x9C, L), // REVAL
    (0x9D, L), // ARSON
    (0x9E, L), // ARSOF
    (0x9F, L), // EXTC3
    (0xAB, L), // HEARTB
    (0xAC, L), // SD
    (0xAF, L), // GRSP
    (0xB0, L), // ACON1
    (0xB1, L), // ACOF1
    (0xB2, L), // REQEV
    (0xB3, L), // ARON1
    (0xB4, L), // AROF1
    (0xB5, L), // NEVAL
    (0xB6, L), // PNN
    (0xB8, L), // ASON1
    (0xB9, L), // ASOF1
    (0xBD, L), // ARSON1
    (0xBE, L), // ARSOF1
    (0xBF, L), // EXTC4
    (0xC7, L), // DGN
    (0xD0, L), // ACON2
    (0xD1, L), // ACOF2
    (0xD2, L), // EVLRN
    (0xD3, L), // EVANS
    (0xD4, L), // ARON2
    (0xD5, L), // AROF2
    (0xD8, L), // ASON2
    (0xD9, L), // ASOF2
    (0xDD, L), // ARSON2
    (0xDE, L), // ARSOF2
    (0xDF, L), // EXTC5
    (0xE2, L), // NAME
    (0xE6, L), // ENACK
    (0xE7, L), // ESD
    (0xE9, L), // DTXC
    (0xEF, L), // PARAMS
    (0xF0, L), // ACON3
    (0xF1, L), // ACOF3
    (0xF2, L), // ENRSP
    (0xF3, L), // ARON3
    (0xF4, L), // AROF3
    (0xF5, L), // EVLRNI
    (0xF6, L), // ACDAT
    (0xF7, L), // ARDAT
    (0xF8, L), // ASON3
    (0xF9, L), // ASOF3
    (0xFA, L), // DDES
    (0xFB, L), // DDRS
    (0xFD, L), // ARSON3
    (0xFE, L), // ARSOF3
];

const fn build_table() -> [Priority; 256] {
    let mut table = [Priority::Normal; 256];
    let mut i = 0;
    while i < OVERRIDES.len() {
        let (opcode, priority) = OVERRIDES[i];
        table[opcode as usize] = priority;
        i += 1;
    }
    table
}

/// One entry per possible opcode value.
static PRIORITIES: [Priority; 256] = build_table();

/// Priority class of `opcode`. Total: every byte value has an entry.
pub fn priority_of(opcode: u8) -> Priority {
    PRIORITIES[opcode as usize]
}
