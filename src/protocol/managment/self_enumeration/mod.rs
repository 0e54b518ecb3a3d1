//! Coordinator-less CANID allocation.
//!
//! A node that needs a CANID broadcasts a zero-payload RTR poll. Every live
//! node answers with a zero-payload frame carrying its own CANID, so during the
//! collection window the enumerating node sees which values are taken, both
//! from the replies and from ordinary traffic. When the window closes the
//! lowest free value in `1..=99` becomes the new CANID.
//!
//! The engine only tracks state and timers. The CAN service owns the CANID,
//! the frames and the diagnostics, and acts on the [`EnumerationEvent`]s
//! returned by [`SelfEnumeration::poll`].
use crate::protocol::transport::can_id::{CanIdentifier, MAX_CAN_ID};
use crate::protocol::transport::config::CanConfig;
use crate::protocol::transport::traits::tick_source::Tick;

//==================================================================================SEEN_IDS
/// Bytes needed for one bit per CANID `0..=99`.
pub const SEEN_IDS_LEN: usize = (MAX_CAN_ID as usize) / 8 + 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Set of CANIDs observed during an enumeration. CANID 0 is always taken.
pub struct SeenIds {
    bits: [u8; SEEN_IDS_LEN],
}

impl Default for SeenIds {
    fn default() -> Self {
        Self::new()
    }
}

impl SeenIds {
    pub const fn new() -> Self {
        let mut bits = [0u8; SEEN_IDS_LEN];
        bits[0] = 0x01;
        Self { bits }
    }

    /// Record `can_id` as taken. Values above 99 are reserved and ignored.
    pub fn mark(&mut self, can_id: u8) {
        if can_id <= MAX_CAN_ID {
            self.bits[usize::from(can_id / 8)] |= 1 << (can_id % 8);
        }
    }

    pub fn is_taken(&self, can_id: u8) -> bool {
        can_id <= MAX_CAN_ID && self.bits[usize::from(can_id / 8)] & (1 << (can_id % 8)) != 0
    }

    /// Lowest CANID not yet seen, `None` when all of `1..=99` are taken.
    pub fn lowest_free(&self) -> Option<CanIdentifier> {
        // Skip full bytes first, then look for the first clear bit.
        let byte = self.bits.iter().position(|b| *b != 0xFF)?;
        let bit = (!self.bits[byte]).trailing_zeros() as usize;
        let candidate = u8::try_from(byte * 8 + bit).ok()?;
        CanIdentifier::new(candidate).ok()
    }
}

//==================================================================================STATE
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Enumeration progress. Timers are measured from `since`.
pub enum EnumerationState {
    /// Idle: the node defends its CANID (if any).
    NoEnumeration,
    /// Waiting out the holdoff before polling. `tx_waiting` is set when
    /// traffic is held back until a CANID is won.
    Required { since: Tick, tx_waiting: bool },
    /// Poll sent, collecting CANIDs.
    InProgress { since: Tick },
    /// Poll sent, collecting CANIDs, with traffic held back.
    InProgressTxWaiting { since: Tick },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Actions the owner of the engine must carry out.
pub enum EnumerationEvent {
    /// Send the RTR poll now.
    Started,
    /// The collection window closed.
    Completed {
        /// Lowest free CANID, `None` when every value is taken.
        allocated: Option<CanIdentifier>,
        /// Held traffic may now be released.
        release_tx: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Outcome of feeding an observed CANID to the engine.
pub enum Observation {
    Ignored,
    /// Recorded as taken by the running enumeration.
    Recorded,
    /// Another node uses our CANID; an enumeration is now required.
    Conflict,
}

//==================================================================================ENGINE
#[derive(Clone, Debug)]
/// The self-enumeration state machine.
pub struct SelfEnumeration {
    state: EnumerationState,
    seen: SeenIds,
}

impl Default for SelfEnumeration {
    fn default() -> Self {
        Self::new()
    }
}

impl SelfEnumeration {
    pub const fn new() -> Self {
        Self {
            state: EnumerationState::NoEnumeration,
            seen: SeenIds::new(),
        }
    }

    pub fn state(&self) -> EnumerationState {
        self.state
    }

    /// True while the poll is out and CANIDs are being collected.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self.state,
            EnumerationState::InProgress { .. } | EnumerationState::InProgressTxWaiting { .. }
        )
    }

    pub fn seen(&self) -> &SeenIds {
        &self.seen
    }

    /// Ask for an enumeration after the holdoff. No effect while one is
    /// already pending or running. Returns `true` when the state changed.
    pub fn require(&mut self, now: Tick) -> bool {
        self.require_with(now, false)
    }

    /// Same as [`Self::require`], remembering that traffic is held back.
    pub fn require_holding_traffic(&mut self, now: Tick) -> bool {
        self.require_with(now, true)
    }

    fn require_with(&mut self, now: Tick, tx_waiting: bool) -> bool {
        if self.state != EnumerationState::NoEnumeration {
            return false;
        }
        self.state = EnumerationState::Required {
            since: now,
            tx_waiting,
        };
        true
    }

    /// A node without a CANID wants to transmit.
    ///
    /// Starts an enumeration straight away when idle (there is no CANID to
    /// defend, so no holdoff is needed), otherwise flags the pending or running
    /// one so the held traffic is released on completion. Returns `true` when
    /// the caller must send the poll.
    pub fn hold_traffic(&mut self, now: Tick) -> bool {
        match self.state {
            EnumerationState::NoEnumeration => {
                self.begin(now, true);
                true
            }
            EnumerationState::Required { since, .. } => {
                self.state = EnumerationState::Required {
                    since,
                    tx_waiting: true,
                };
                false
            }
            EnumerationState::InProgress { since } => {
                self.state = EnumerationState::InProgressTxWaiting { since };
                false
            }
            EnumerationState::InProgressTxWaiting { .. } => false,
        }
    }

    /// Feed the sender CANID of an inbound frame.
    ///
    /// While collecting, the value is recorded. While idle, a frame carrying
    /// our own (non-zero) CANID is a conflict and moves the engine to
    /// `Required`.
    pub fn observe(&mut self, can_id: u8, own_id: u8, now: Tick) -> Observation {
        match self.state {
            EnumerationState::InProgress { .. } | EnumerationState::InProgressTxWaiting { .. } => {
                self.seen.mark(can_id);
                Observation::Recorded
            }
            EnumerationState::NoEnumeration if own_id != 0 && can_id == own_id => {
                self.require(now);
                Observation::Conflict
            }
            _ => Observation::Ignored,
        }
    }

    /// Another node is polling: restart a pending holdoff so we enumerate
    /// after it and see its result.
    pub fn on_poll_seen(&mut self, now: Tick) {
        if let EnumerationState::Required { tx_waiting, .. } = self.state {
            self.state = EnumerationState::Required {
                since: now,
                tx_waiting,
            };
        }
    }

    /// Advance the timers.
    pub fn poll(&mut self, now: Tick, config: &CanConfig) -> Option<EnumerationEvent> {
        match self.state {
            EnumerationState::NoEnumeration => None,
            EnumerationState::Required { since, tx_waiting } => {
                if !now.has_expired(since, config.enumeration_holdoff) {
                    return None;
                }
                self.begin(now, tx_waiting);
                Some(EnumerationEvent::Started)
            }
            EnumerationState::InProgress { since } | EnumerationState::InProgressTxWaiting { since } => {
                if !now.has_expired(since, config.enumeration_timeout) {
                    return None;
                }
                let release_tx = matches!(self.state, EnumerationState::InProgressTxWaiting { .. });
                self.state = EnumerationState::NoEnumeration;
                Some(EnumerationEvent::Completed {
                    allocated: self.seen.lowest_free(),
                    release_tx,
                })
            }
        }
    }

    /// Drop any pending or running enumeration.
    pub fn cancel(&mut self) {
        self.state = EnumerationState::NoEnumeration;
    }

    fn begin(&mut self, now: Tick, tx_waiting: bool) {
        self.seen = SeenIds::new();
        self.state = if tx_waiting {
            EnumerationState::InProgressTxWaiting { since: now }
        } else {
            EnumerationState::InProgress { since: now }
        };
    }
}
