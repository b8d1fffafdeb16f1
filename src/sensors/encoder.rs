//! Metering-shaft encoder: pulse counter → revolutions and smoothed RPM.
//!
//! The PCNT unit counts rising edges on encoder channel A into a signed
//! 16-bit register.  [`PulseRateTracker::update`] must be called every
//! control tick:
//!
//! ```text
//!  every call      : raw count ──fold──▶ Δpulses ──▶ completed revs + remainder
//!  every 200 ms    : Δrevs / Δminutes ──▶ 5-slot history ──▶ reported rpm
//! ```
//!
//! The register is drained and re-zeroed on every call, so it never gets
//! near the PCNT high limit (where the peripheral resets to zero on its
//! own) at any realistic shaft speed: 1024 ppr at 300 RPM is ~51 pulses
//! per 10 ms tick.  The running total is kept as whole revolutions plus a
//! remainder in `0..pulses_per_rev`, so reverse rotation borrows across
//! zero exactly like integer subtraction.

use crate::app::ports::PulseCounterPort;
use crate::config::ControllerConfig;

const RPM_HISTORY_CAP: usize = 5;

/// Wraparound-aware difference between two successive counter reads.
///
/// The counter is a two's-complement `i16`, so the true delta is the
/// wrapping difference: a step from `+32760` to `-32760` is `+16` pulses,
/// not `-65520`.  After a drain the previous read is zero and the delta is
/// the raw value itself.
pub fn counter_delta(prev: i16, cur: i16) -> i32 {
    i32::from(cur.wrapping_sub(prev))
}

/// Snapshot of the tracker's derived values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShaftReading {
    /// Averaged RPM over the last five samples.
    pub rpm: f32,
    /// Signed revolutions since the last reset, including the fraction.
    pub revolutions: f32,
    /// A pulse was seen within the moving timeout.
    pub moving: bool,
}

pub struct PulseRateTracker {
    pulses_per_rev: i64,
    sample_interval_ms: u64,
    moving_timeout_ms: u64,

    last_raw: i16,
    completed_revs: i64,
    remainder: i64,

    last_sample_pulses: i64,
    last_sample_ms: u64,
    last_pulse_ms: u64,

    ring: [f32; RPM_HISTORY_CAP],
    head: usize,
    count: usize,

    reading: ShaftReading,
}

impl PulseRateTracker {
    /// Clear the hardware counter and all derived state.
    pub fn begin(config: &ControllerConfig, now_ms: u64, counter: &mut impl PulseCounterPort) -> Self {
        counter.clear_count();
        Self {
            pulses_per_rev: i64::from(config.pulses_per_rev.max(1)),
            sample_interval_ms: u64::from(config.rpm_sample_interval_ms.max(1)),
            moving_timeout_ms: u64::from(config.moving_timeout_ms),
            last_raw: 0,
            completed_revs: 0,
            remainder: 0,
            last_sample_pulses: 0,
            last_sample_ms: now_ms,
            last_pulse_ms: now_ms,
            ring: [0.0; RPM_HISTORY_CAP],
            head: 0,
            count: 0,
            reading: ShaftReading::default(),
        }
    }

    /// Drain the counter and, when the sample interval has elapsed,
    /// recompute RPM.  Returns the current reading either way.
    pub fn update(&mut self, now_ms: u64, counter: &mut impl PulseCounterPort) -> ShaftReading {
        let raw = counter.read_count();
        counter.clear_count();
        let delta = counter_delta(self.last_raw, raw);
        self.last_raw = 0;

        if delta != 0 {
            self.last_pulse_ms = now_ms;
            self.accumulate(i64::from(delta));
        }

        let elapsed_ms = now_ms.saturating_sub(self.last_sample_ms);
        if elapsed_ms >= self.sample_interval_ms {
            let total = self.total_pulses();
            let delta_revs = (total - self.last_sample_pulses) as f32 / self.pulses_per_rev as f32;
            let elapsed_min = elapsed_ms as f32 / 60_000.0;
            self.push_rpm(delta_revs / elapsed_min);

            self.last_sample_pulses = total;
            self.last_sample_ms = now_ms;
            self.reading.rpm = self.average_rpm();
        }

        self.reading.revolutions = self.revolutions();
        self.reading.moving = now_ms.saturating_sub(self.last_pulse_ms) < self.moving_timeout_ms;
        self.reading
    }

    /// Zero the hardware counter and the revolution count.
    ///
    /// The RPM history is kept so the reported speed does not drop to
    /// zero just because a calibration restarted.
    pub fn reset_revolutions(&mut self, counter: &mut impl PulseCounterPort) {
        counter.clear_count();
        self.last_raw = 0;
        self.completed_revs = 0;
        self.remainder = 0;
        self.last_sample_pulses = 0;
        self.reading.revolutions = 0.0;
    }

    pub fn reading(&self) -> ShaftReading {
        self.reading
    }

    /// Completed whole revolutions (negative when run backwards).
    pub fn completed_revolutions(&self) -> i64 {
        self.completed_revs
    }

    /// Pulses into the current revolution, always in `0..pulses_per_rev`.
    pub fn remainder_pulses(&self) -> i64 {
        self.remainder
    }

    pub fn revolutions(&self) -> f32 {
        self.completed_revs as f32 + self.remainder as f32 / self.pulses_per_rev as f32
    }

    fn total_pulses(&self) -> i64 {
        self.completed_revs * self.pulses_per_rev + self.remainder
    }

    fn accumulate(&mut self, delta: i64) {
        let pulses = self.remainder + delta;
        self.completed_revs += pulses.div_euclid(self.pulses_per_rev);
        self.remainder = pulses.rem_euclid(self.pulses_per_rev);
    }

    fn push_rpm(&mut self, rpm: f32) {
        self.ring[self.head] = rpm;
        self.head = (self.head + 1) % RPM_HISTORY_CAP;
        if self.count < RPM_HISTORY_CAP {
            self.count += 1;
        }
    }

    fn average_rpm(&self) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        let sum: f32 = self.ring[..self.count].iter().sum();
        sum / self.count as f32
    }
}
