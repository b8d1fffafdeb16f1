//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (serial log, screen, test recorder).

use crate::error::FaultCode;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),

    /// The drive fault code changed.
    FaultChanged { from: FaultCode, to: FaultCode },

    /// Pairing button held long enough; accepting pair requests.
    PairingModeEntered,

    /// Pairing mode expired without a request.
    PairingTimedOut,

    /// A screen was adopted as the peer.
    Paired { addr: [u8; 6] },

    /// Peer identity dropped; back to broadcast.
    PeerForgotten,

    /// Seed-per-rev recomputed from a calibration catch.
    Calibrated { seed_per_rev: f32, revolutions: f32 },

    /// Seed-per-rev overwritten by the operator.
    SeedPerRevSet(f32),

    /// The service has started.
    Started,
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryData {
    pub speed_mph: f32,
    pub target_rpm: f32,
    pub shaft_rpm: f32,
    pub revolutions: f32,
    pub duty: u8,
    pub actual_rate: f32,
    pub work_switch: bool,
    pub fault: FaultCode,
    pub paired: bool,
}
