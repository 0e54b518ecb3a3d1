//! `vlcb-can` library: the CAN transport service of a VLCB/CBUS node in a
//! `no_std` environment. The crate exposes the message model and priority map,
//! the frame queues and hardware channel seam, the CANID self-enumeration engine,
//! and the transport façade shared between interrupt and main-loop context.
#![no_std]
//==================================================================================
/// Error types (identifier range, frame shape, queue capacity, slot availability).
pub mod error;
/// VLCB protocol implementation: messages, CAN transport, and CANID management.
pub mod protocol;
//==================================================================================
