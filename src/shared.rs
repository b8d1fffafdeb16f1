//! Cross-task shared state.
//!
//! ```text
//!  ESP-NOW rx cb ──▶ inbound Channel ──▶ control loop ──▶ atomics / snapshots
//!                                                      │
//!                        stall monitor thread ◀────────┘ (reads, trips fault)
//! ```
//!
//! Scalars live in atomics.  Composite values ([`ControlConfig`],
//! [`PeerIdentity`], [`GpsReading`]) live behind a critical-section
//! `blocking_mutex` holding a `Cell`, so readers always take a whole
//! `Copy` snapshot and never observe a half-written struct.  The control
//! loop is the only writer of `control`; the radio callback never touches
//! it directly and goes through the inbound channel instead.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::config::ControlConfig;
use crate::fault::FaultState;
use crate::gps::{GpsReading, local_hour};
use crate::link::channels::{INBOUND_DEPTH, InboundMessage};
use crate::link::packet::StatusPacket;
use crate::link::pairing::PeerIdentity;

// ── AtomicF32 ─────────────────────────────────────────────────

/// `f32` stored as its bit pattern in an `AtomicU32`.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub const fn zero() -> Self {
        Self(AtomicU32::new(0)) // 0.0f32 is all-zero bits
    }

    pub fn new(v: f32) -> Self {
        Self(AtomicU32::new(v.to_bits()))
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, v: f32) {
        self.0.store(v.to_bits(), Ordering::Release);
    }
}

type Snapshot<T> = Mutex<CriticalSectionRawMutex, Cell<T>>;

// ── SharedState ───────────────────────────────────────────────

/// Everything the control loop, stall monitor and radio callback share.
pub struct SharedState {
    // Drive measurements (written by the control loop)
    pub rpm: AtomicF32,
    pub revolutions: AtomicF32,
    pub moving: AtomicBool,
    pub work_switch: AtomicBool,
    pub motor_active: AtomicBool,
    pub motor_duty: AtomicU8,
    pub actual_rate: AtomicF32,

    /// Drive fault state machine.
    pub fault: FaultState,

    control: Snapshot<ControlConfig>,
    peer: Snapshot<PeerIdentity>,
    gps: Snapshot<GpsReading>,

    /// Decoded packets waiting for the control loop.
    pub inbound: Channel<CriticalSectionRawMutex, InboundMessage, INBOUND_DEPTH>,
}

impl SharedState {
    pub fn new(control: ControlConfig, peer: PeerIdentity) -> Self {
        Self {
            rpm: AtomicF32::zero(),
            revolutions: AtomicF32::zero(),
            moving: AtomicBool::new(false),
            work_switch: AtomicBool::new(false),
            motor_active: AtomicBool::new(false),
            motor_duty: AtomicU8::new(0),
            actual_rate: AtomicF32::zero(),
            fault: FaultState::new(),
            control: Mutex::new(Cell::new(control)),
            peer: Mutex::new(Cell::new(peer)),
            gps: Mutex::new(Cell::new(GpsReading::default())),
            inbound: Channel::new(),
        }
    }

    // ── Composite snapshots ───────────────────────────────────

    pub fn control(&self) -> ControlConfig {
        self.control.lock(Cell::get)
    }

    pub fn set_control(&self, cfg: ControlConfig) {
        self.control.lock(|c| c.set(cfg));
    }

    /// Read-modify-write of the control config under one lock.
    pub fn update_control(&self, f: impl FnOnce(&mut ControlConfig)) -> ControlConfig {
        self.control.lock(|c| {
            let mut cfg = c.get();
            f(&mut cfg);
            c.set(cfg);
            cfg
        })
    }

    pub fn peer(&self) -> PeerIdentity {
        self.peer.lock(Cell::get)
    }

    pub fn set_peer(&self, peer: PeerIdentity) {
        self.peer.lock(|c| c.set(peer));
    }

    /// Latest GPS fix published by the external NMEA reader.
    pub fn gps(&self) -> GpsReading {
        self.gps.lock(Cell::get)
    }

    pub fn publish_gps(&self, reading: GpsReading) {
        self.gps.lock(|c| c.set(reading));
    }

    // ── Motor ─────────────────────────────────────────────────

    pub fn record_motor(&self, duty: u8, active: bool) {
        self.motor_duty.store(duty, Ordering::Release);
        self.motor_active.store(active, Ordering::Release);
    }

    pub fn motor_duty(&self) -> u8 {
        self.motor_duty.load(Ordering::Acquire)
    }

    // ── Status ────────────────────────────────────────────────

    /// Assemble the outbound status packet from the current state.
    pub fn status_packet(&self, utc_offset_hours: i8) -> StatusPacket {
        let gps = self.gps();
        let control = self.control();
        let fault = self.fault.code();
        StatusPacket {
            fix_valid: gps.fix_valid,
            num_satellites: gps.num_satellites,
            speed_mph: gps.speed_mph,
            hour: local_hour(gps.hour, utc_offset_hours),
            minute: gps.minute,
            second: gps.second,
            calibration_revs: self.revolutions.load(),
            work_switch: self.work_switch.load(Ordering::Acquire),
            motor_active: self.motor_active.load(Ordering::Acquire),
            seed_per_rev: control.seed_per_rev,
            shaft_rpm: self.rpm.load(),
            error_code: fault,
            error_raised: self.fault.is_raised(),
            actual_rate: self.actual_rate.load(),
            version: StatusPacket::version_field(env!("CARGO_PKG_VERSION")),
        }
    }
}
