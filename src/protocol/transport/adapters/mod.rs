//! Ready-made [`HardwareChannelAdapter`](super::traits::channel_adapter::HardwareChannelAdapter)
//! implementations.
pub mod nb_can;
