//! Network management logic: CANID self-enumeration and the CAN service
//! that defends the CANID while carrying application traffic.
pub mod can_service;
pub mod self_enumeration;
