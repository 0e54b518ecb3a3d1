//! High-level components of the VLCB CAN service: message structures and
//! priorities, CAN transport plumbing, and CANID management.
pub mod managment;
pub mod messages;
pub mod transport;
