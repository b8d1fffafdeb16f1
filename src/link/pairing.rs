//! Screen pairing state machine.
//!
//! ```text
//!              hold 3 s                 pair request
//!  Unpaired ───────────▶ PairingMode ──────────────────▶ Paired
//!     ▲                    │   ▲                           │
//!     └── timeout (60 s) ──┘   └──────── hold 3 s ─────────┘
//!                          └──── timeout (60 s) ──▶ Paired (if it was)
//!
//!  any state ── same hold kept up to 10 s ──▶ Unpaired (peer forgotten)
//! ```
//!
//! The manager is pure state: it decides whether a pair request is
//! accepted and which peer to adopt.  The caller registers the peer with
//! the radio, sends the single ack and persists the identity.

use log::{info, warn};

use crate::config::ControllerConfig;
use crate::drivers::button::HoldTrigger;

/// ESP-NOW broadcast address, used until a screen pairs.
pub const BROADCAST_ADDR: [u8; 6] = [0xFF; 6];

/// The single screen this controller talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerIdentity {
    pub addr: [u8; 6],
    pub paired: bool,
}

impl PeerIdentity {
    pub const fn broadcast() -> Self {
        Self {
            addr: BROADCAST_ADDR,
            paired: false,
        }
    }

    pub const fn paired(addr: [u8; 6]) -> Self {
        Self { addr, paired: true }
    }
}

impl Default for PeerIdentity {
    fn default() -> Self {
        Self::broadcast()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    Unpaired,
    PairingMode { entered_ms: u64, was_paired: bool },
    Paired,
}

/// What a [`PairingManager::poll`] call changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingEvent {
    Entered,
    TimedOut,
    /// The button stayed down past the forget hold; the caller drops the peer.
    ForgetRequested,
}

pub struct PairingManager {
    state: PairingState,
    hold: HoldTrigger,
    forget_hold: HoldTrigger,
    timeout_ms: u64,
}

impl PairingManager {
    pub fn new(config: &ControllerConfig, peer: &PeerIdentity) -> Self {
        Self {
            state: if peer.paired {
                PairingState::Paired
            } else {
                PairingState::Unpaired
            },
            hold: HoldTrigger::new(config.pairing_hold_ms),
            forget_hold: HoldTrigger::new(config.forget_hold_ms),
            timeout_ms: u64::from(config.pairing_timeout_ms),
        }
    }

    pub fn state(&self) -> PairingState {
        self.state
    }

    pub fn in_pairing_mode(&self) -> bool {
        matches!(self.state, PairingState::PairingMode { .. })
    }

    /// Feed the pairing button level (`true` = held) once per cycle.
    pub fn poll(&mut self, now_ms: u64, pressed: bool) -> Option<PairingEvent> {
        let entered = self.hold.update(pressed, now_ms);
        if self.forget_hold.update(pressed, now_ms) {
            self.forget();
            info!("Pairing: forget hold");
            return Some(PairingEvent::ForgetRequested);
        }
        if entered {
            let was_paired = match self.state {
                PairingState::PairingMode { was_paired, .. } => was_paired,
                other => other == PairingState::Paired,
            };
            self.state = PairingState::PairingMode {
                entered_ms: now_ms,
                was_paired,
            };
            info!("Pairing: mode entered");
            return Some(PairingEvent::Entered);
        }

        if let PairingState::PairingMode {
            entered_ms,
            was_paired,
        } = self.state
        {
            if self.timeout_ms > 0 && now_ms.saturating_sub(entered_ms) >= self.timeout_ms {
                self.state = if was_paired {
                    PairingState::Paired
                } else {
                    PairingState::Unpaired
                };
                warn!("Pairing: timed out after {} ms", self.timeout_ms);
                return Some(PairingEvent::TimedOut);
            }
        }
        None
    }

    /// Handle a pair request from `src`.  Returns the new peer when the
    /// request is accepted; outside pairing mode it is ignored.
    pub fn accept(&mut self, src: [u8; 6]) -> Option<PeerIdentity> {
        if !self.in_pairing_mode() {
            info!("Pairing: request from {} ignored (not in pairing mode)", fmt_addr(&src));
            return None;
        }
        self.state = PairingState::Paired;
        info!("Pairing: paired with {}", fmt_addr(&src));
        Some(PeerIdentity::paired(src))
    }

    /// Drop the current peer.
    pub fn forget(&mut self) {
        self.state = PairingState::Unpaired;
    }
}

/// `AA:BB:CC:DD:EE:FF` formatting for log lines.
pub fn fmt_addr(addr: &[u8; 6]) -> heapless::String<17> {
    use core::fmt::Write;
    let mut s = heapless::String::new();
    let _ = write!(
        s,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        addr[0], addr[1], addr[2], addr[3], addr[4], addr[5]
    );
    s
}
