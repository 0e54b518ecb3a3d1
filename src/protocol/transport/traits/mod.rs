//! Abstraction traits used by the transport layer (hardware channel, tick
//! source, and CANID persistence).
pub mod can_id_store;
pub mod channel_adapter;
pub mod tick_source;
