//! Runtime configuration of the CAN service.
use embassy_time::Duration;

use crate::protocol::transport::{
    CAN_TX_TIMEOUT_MS, ENUMERATION_HOLDOFF_MS, ENUMERATION_TIMEOUT_MS, LARB_RETRIES,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Tunables of the CAN service. `Default` uses the protocol constants.
pub struct CanConfig {
    /// Loop outgoing event opcodes back into the receive path.
    pub consume_own_events: bool,
    /// Wait between a conflict and the enumeration it triggers.
    pub enumeration_holdoff: Duration,
    /// Collection window of an enumeration.
    pub enumeration_timeout: Duration,
    /// Hardware slot occupancy after which a transmit is aborted.
    pub tx_timeout: Duration,
    /// Arbitration losses tolerated per frame.
    pub arbitration_retries: u8,
}

impl Default for CanConfig {
    fn default() -> Self {
        Self {
            consume_own_events: false,
            enumeration_holdoff: Duration::from_millis(ENUMERATION_HOLDOFF_MS),
            enumeration_timeout: Duration::from_millis(ENUMERATION_TIMEOUT_MS),
            tx_timeout: Duration::from_millis(CAN_TX_TIMEOUT_MS),
            arbitration_retries: LARB_RETRIES,
        }
    }
}

impl CanConfig {
    pub fn with_consume_own_events(mut self, enabled: bool) -> Self {
        self.consume_own_events = enabled;
        self
    }

    pub fn with_enumeration_holdoff(mut self, holdoff: Duration) -> Self {
        self.enumeration_holdoff = holdoff;
        self
    }

    pub fn with_enumeration_timeout(mut self, timeout: Duration) -> Self {
        self.enumeration_timeout = timeout;
        self
    }

    pub fn with_tx_timeout(mut self, timeout: Duration) -> Self {
        self.tx_timeout = timeout;
        self
    }

    pub fn with_arbitration_retries(mut self, retries: u8) -> Self {
        self.arbitration_retries = retries;
        self
    }
}
