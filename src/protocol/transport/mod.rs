//! VLCB CAN transport layer: frame identifiers and frames, software frame
//! queues, diagnostics, configuration, and the hardware abstraction traits.
//!
//! ## Timing Constants
//!
//! These constants define the protocol delays of CANID self-enumeration and
//! the transmit watchdog. They are the defaults of [`config::CanConfig`].

pub mod adapters;
pub mod can_frame;
pub mod can_id;
pub mod config;
pub mod diagnostics;
pub mod frame_queue;
pub mod traits;

/// Collection window of a self-enumeration (ms).
///
/// After the enumeration poll is sent, every CANID seen on the bus during this
/// window is recorded as taken. Replies are sent at the highest priority, so
/// 100 ms is ample even on a busy 125 kbit/s segment.
pub const ENUMERATION_TIMEOUT_MS: u64 = 100;

/// Delay between detecting a CANID conflict and starting the enumeration (ms).
///
/// Both nodes of a clash detect it on the same frame. Waiting, and restarting
/// the wait whenever another node's poll is seen, lets one of them enumerate
/// first so the other observes its new CANID instead of racing for the same one.
pub const ENUMERATION_HOLDOFF_MS: u64 = 200;

/// Time a frame may occupy the hardware transmit slot before it is aborted (ms).
///
/// Prevents a frame that can never win arbitration (or a disconnected bus)
/// from starving the software backlog.
pub const CAN_TX_TIMEOUT_MS: u64 = 1000;

/// Arbitration losses tolerated for one frame before it is abandoned.
pub const LARB_RETRIES: u8 = 10;
