//! Drive fault state machine and stall monitor.
//!
//! ```text
//!            Deadband (no fault raised)           Ceiling (no fault raised)
//!   Clear ─────────────────────────▶ Min(1)   Clear ─────────────────▶ Max(2)
//!     ▲   ◀──── Linear PID output ────┘  └──────── Linear ──────────────┘
//!     │
//!     │ ack && work switch off          stall window elapsed
//!     └────────────────────── Stall(3) ◀──────────────── any state
//! ```
//!
//! The state is a single `AtomicU8` so the control loop (PID transitions,
//! acknowledgements) and the stall monitor thread (stall trip) can both
//! drive it without a lock; every transition is one compare-and-swap.
//!
//! ## Fault lifecycle
//!
//! 1. The PID step reports where its output landed ([`Saturation`]).
//! 2. Deadband / ceiling raise codes 1 / 2 if nothing is raised yet.
//! 3. The next strictly-linear output clears them again.
//! 4. The stall monitor runs on its own thread at 10 ms.  When the work
//!    switch is engaged and the shaft has been below the stall threshold
//!    for the whole stall window it latches code 3, cuts the motor and
//!    bursts the status packet to the screen.
//! 5. Code 3 ignores PID output entirely and clears only on an operator
//!    acknowledgement received while the work switch is off.

use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use crate::app::ports::{LinkPort, MotorCutoff};
use crate::config::ControllerConfig;
use crate::control::pid::Saturation;
use crate::error::FaultCode;
use crate::shared::SharedState;

/// A fault code change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultTransition {
    pub from: FaultCode,
    pub to: FaultCode,
}

// ── FaultState ────────────────────────────────────────────────

/// Lock-free fault register shared by every task.
#[derive(Debug, Default)]
pub struct FaultState(AtomicU8);

impl FaultState {
    pub const fn new() -> Self {
        Self(AtomicU8::new(FaultCode::None as u8))
    }

    pub fn code(&self) -> FaultCode {
        FaultCode::from_code(self.0.load(Ordering::Acquire))
    }

    /// Any fault is currently raised.
    pub fn is_raised(&self) -> bool {
        self.code() != FaultCode::None
    }

    /// Apply the deadband / saturation rules for one PID step.
    pub fn on_pid_output(&self, saturation: Saturation) -> Option<FaultTransition> {
        self.transition(|current| match (current, saturation) {
            (FaultCode::None, Saturation::Deadband) => Some(FaultCode::MinPwmDeadband),
            (FaultCode::None, Saturation::Ceiling) => Some(FaultCode::MaxPwmSaturation),
            (FaultCode::MinPwmDeadband | FaultCode::MaxPwmSaturation, Saturation::Linear) => {
                Some(FaultCode::None)
            }
            _ => None,
        })
    }

    /// Latch a shaft stall.  Returns `true` only for the call that
    /// actually entered the stall state.
    pub fn trip_stall(&self) -> bool {
        self.transition(|current| {
            (current != FaultCode::ShaftStall).then_some(FaultCode::ShaftStall)
        })
        .is_some()
    }

    /// Operator acknowledgement from the screen.
    ///
    /// Only a stall is acknowledged, and only once the work switch reads
    /// inactive.  Codes 1 and 2 clear on PID output alone.
    pub fn acknowledge(&self, work_switch_active: bool) -> Option<FaultTransition> {
        self.transition(|current| match current {
            FaultCode::ShaftStall if !work_switch_active => Some(FaultCode::None),
            _ => None,
        })
    }

    fn transition(&self, f: impl Fn(FaultCode) -> Option<FaultCode>) -> Option<FaultTransition> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                f(FaultCode::from_code(raw)).map(FaultCode::code)
            })
            .ok()
            .and_then(|prev| {
                let from = FaultCode::from_code(prev);
                let to = f(from)?;
                if to == FaultCode::None {
                    info!("Fault: {} cleared", from);
                } else if to.is_latched() {
                    error!("Fault: {} latched (was {})", to, from);
                } else {
                    warn!("Fault: {} raised", to);
                }
                Some(FaultTransition { from, to })
            })
    }
}

// ── StallMonitor ──────────────────────────────────────────────

/// Inputs sampled by the stall monitor each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StallSample {
    pub work_switch: bool,
    pub rpm: f32,
    pub moving: bool,
    pub protection_enabled: bool,
    pub window_ms: u32,
}

/// Debounces the "engaged but not turning" condition over the stall
/// window.  Pure timing logic; [`StallGuard`] wires it to the hardware.
#[derive(Debug, Clone)]
pub struct StallMonitor {
    threshold_rpm: f32,
    low_since_ms: Option<u64>,
}

impl StallMonitor {
    pub fn new(threshold_rpm: f32) -> Self {
        Self {
            threshold_rpm,
            low_since_ms: None,
        }
    }

    /// Returns `true` once the condition has held for the whole window.
    pub fn sample(&mut self, now_ms: u64, s: StallSample) -> bool {
        // The averaged RPM decays slowly; no pulses inside the moving
        // timeout means the shaft is stopped regardless of the average.
        let rpm = if s.moving { s.rpm } else { 0.0 };

        if !s.protection_enabled || !s.work_switch || rpm >= self.threshold_rpm {
            self.low_since_ms = None;
            return false;
        }

        let since = *self.low_since_ms.get_or_insert(now_ms);
        now_ms.saturating_sub(since) >= u64::from(s.window_ms)
    }

    pub fn reset(&mut self) {
        self.low_since_ms = None;
    }
}

// ── StallGuard ────────────────────────────────────────────────

/// The stall monitor task body: samples shared state, trips the fault,
/// cuts the motor and bursts the status packet.
pub struct StallGuard<L: LinkPort, C: MotorCutoff> {
    shared: Arc<SharedState>,
    link: Arc<L>,
    cutoff: C,
    monitor: StallMonitor,
    burst_count: u8,
    burst_gap_ms: u32,
    utc_offset_hours: i8,
}

impl<L: LinkPort, C: MotorCutoff> StallGuard<L, C> {
    pub fn new(config: &ControllerConfig, shared: Arc<SharedState>, link: Arc<L>, cutoff: C) -> Self {
        Self {
            shared,
            link,
            cutoff,
            monitor: StallMonitor::new(config.stall_rpm_threshold),
            burst_count: config.fault_burst_count,
            burst_gap_ms: config.fault_burst_gap_ms,
            utc_offset_hours: config.utc_offset_hours,
        }
    }

    /// One monitor tick.  Returns `true` when this tick latched a stall.
    pub fn poll(&mut self, now_ms: u64, delay: &mut impl DelayNs) -> bool {
        let control = self.shared.control();
        let sample = StallSample {
            work_switch: self.shared.work_switch.load(Ordering::Acquire),
            rpm: self.shared.rpm.load(),
            moving: self.shared.moving.load(Ordering::Acquire),
            protection_enabled: control.stall_protection,
            window_ms: control.stall_window_ms(),
        };

        if !self.monitor.sample(now_ms, sample) || !self.shared.fault.trip_stall() {
            return false;
        }

        self.cutoff.cut();
        self.shared.record_motor(0, false);
        self.burst(delay);
        true
    }

    /// Fire-and-forget status burst.  Failures are logged, not retried.
    fn burst(&self, delay: &mut impl DelayNs) {
        let peer = self.shared.peer();
        let packet = self.shared.status_packet(self.utc_offset_hours).encode();
        for i in 0..self.burst_count {
            if let Err(e) = self.link.send(&peer.addr, &packet) {
                warn!("Stall burst {}/{}: {}", i + 1, self.burst_count, e);
            }
            if i + 1 < self.burst_count {
                delay.delay_ms(self.burst_gap_ms);
            }
        }
        info!("Stall burst sent ({} packets)", self.burst_count);
    }
}
