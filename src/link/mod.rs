//! ESP-NOW link to the screen: wire format, pairing and the inbound queue.

pub mod channels;
pub mod packet;
pub mod pairing;
