//! Fuzz target: `Packet::decode` / `StatusPacket::decode`
//!
//! Drives arbitrary ESP-NOW payloads into both frame decoders and asserts
//! that they never panic and that every accepted command re-encodes to
//! a stable canonical frame.
//!
//! cargo fuzz run fuzz_packet_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use seedmeter::link::packet::{COMMAND_LEN, Packet, StatusPacket};

fuzz_target!(|data: &[u8]| {
    if let Ok(Packet::Command(cmd)) = Packet::decode(data) {
        // Bools decode as "non-zero", so only canonical frames round-trip.
        let canonical = cmd.encode();
        assert_eq!(canonical.len(), COMMAND_LEN);
        match Packet::decode(&canonical) {
            Ok(Packet::Command(again)) => assert_eq!(again.encode(), canonical),
            other => panic!("canonical command rejected: {:?}", other),
        }
    }

    let _ = StatusPacket::decode(data);
});
