//! Radio callback → control loop hand-off.
//!
//! The ESP-NOW receive callback runs in the WiFi task.  It only decodes
//! and enqueues; every state change happens on the control loop when it
//! drains the channel.
//!
//! Every command carries the screen's full configuration, so a plain
//! config update is superseded by the next one.  Pair requests and
//! commands with a one-shot flag (calibrate, manual seed/rev, fault ack)
//! are not.  When the queue is full the oldest config-only message is
//! evicted; if every queued message is one-shot, an incoming config-only
//! message is dropped instead, and an incoming one-shot evicts the oldest.

use embassy_sync::channel::TrySendError;
use log::{debug, warn};

use super::packet::{Packet, PacketError};
use crate::shared::SharedState;

/// Inbound queue depth.  The screen sends at most a few packets per
/// second; eight covers several control-loop stalls.
pub const INBOUND_DEPTH: usize = 8;

/// A decoded packet and the address it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InboundMessage {
    pub src: [u8; 6],
    pub packet: Packet,
}

/// Decode `bytes` and enqueue them for the control loop.
pub fn deliver(shared: &SharedState, src: [u8; 6], bytes: &[u8]) -> Result<(), PacketError> {
    let packet = Packet::decode(bytes).inspect_err(|e| debug!("Link: dropped frame: {}", e))?;
    let msg = InboundMessage { src, packet };

    if let Err(TrySendError::Full(msg)) = shared.inbound.try_send(msg) {
        make_room(shared, msg);
    }
    Ok(())
}

/// Carries something a later command does not repeat.
pub fn is_one_shot(packet: &Packet) -> bool {
    match packet {
        Packet::PairRequest => true,
        Packet::Command(c) => c.calc_seed_per_rev || c.manual_seed_update || c.error_ack,
        Packet::PairAck => false,
    }
}

// Single producer: only the radio callback enqueues, so the pending
// messages can be pulled out and pushed back in order.
fn make_room(shared: &SharedState, msg: InboundMessage) {
    let mut pending: heapless::Vec<InboundMessage, INBOUND_DEPTH> = heapless::Vec::new();
    while let Ok(m) = shared.inbound.try_receive() {
        let _ = pending.push(m);
    }

    // The control loop may have drained some while we were looking.
    if pending.is_full() {
        if let Some(i) = pending.iter().position(|m| !is_one_shot(&m.packet)) {
            pending.remove(i);
            warn!("Link: inbound queue full, oldest config update dropped");
        } else if is_one_shot(&msg.packet) {
            pending.remove(0);
            warn!("Link: inbound queue full, oldest one-shot message dropped");
        }
    }

    if pending.push(msg).is_err() {
        warn!("Link: inbound queue full of one-shot messages, config update dropped");
    }
    requeue(shared, pending);
}

fn requeue(shared: &SharedState, pending: heapless::Vec<InboundMessage, INBOUND_DEPTH>) {
    for m in pending {
        if shared.inbound.try_send(m).is_err() {
            warn!("Link: inbound message dropped");
        }
    }
}

/// Pop every pending message, oldest first.
pub fn drain(shared: &SharedState) -> impl Iterator<Item = InboundMessage> + '_ {
    core::iter::from_fn(|| shared.inbound.try_receive().ok())
}
