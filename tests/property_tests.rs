//! Property tests for the numeric core and the wire decoder.
//!
//! Runs on host (x86_64) only: proptest is not available for ESP32 targets.
//! On ESP32, these tests are compiled out.

#![cfg(not(target_os = "espidf"))]

use proptest::prelude::*;
use seedmeter::app::ports::PulseCounterPort;
use seedmeter::config::ControllerConfig;
use seedmeter::control::pid::PidController;
use seedmeter::control::rate::{calculate_seed_per_rev, calculate_target_shaft_rpm};
use seedmeter::link::packet::{Packet, StatusPacket};
use seedmeter::sensors::encoder::{PulseRateTracker, counter_delta};

// ── Rate math ─────────────────────────────────────────────────

proptest! {
    /// Doubling the target rate doubles the required shaft speed.
    #[test]
    fn target_rpm_is_linear_in_rate(
        speed in 0.5f32..20.0,
        rate in 0.1f32..500.0,
        spr in 0.001f32..5.0,
        width in 1.0f32..120.0,
    ) {
        let one = calculate_target_shaft_rpm(speed, rate, spr, width);
        let two = calculate_target_shaft_rpm(speed, rate * 2.0, spr, width);
        prop_assert!(one > 0.0);
        prop_assert!((two - 2.0 * one).abs() <= one * 1e-4);
    }

    #[test]
    fn target_rpm_is_linear_in_speed(
        speed in 0.5f32..20.0,
        rate in 0.1f32..500.0,
        spr in 0.001f32..5.0,
        width in 1.0f32..120.0,
    ) {
        let one = calculate_target_shaft_rpm(speed, rate, spr, width);
        let three = calculate_target_shaft_rpm(speed * 3.0, rate, spr, width);
        prop_assert!((three - 3.0 * one).abs() <= one * 1e-4);
    }

    #[test]
    fn uncalibrated_meter_never_turns(
        speed in 0.0f32..50.0,
        rate in 0.0f32..1000.0,
        width in 0.0f32..200.0,
    ) {
        prop_assert_eq!(calculate_target_shaft_rpm(speed, rate, 0.0, width), 0.0);
    }

    #[test]
    fn seed_per_rev_is_always_finite(
        revs in -1.0e6f32..1.0e6,
        weight in 0.0f32..1000.0,
        runs in 0i32..100,
    ) {
        prop_assert!(calculate_seed_per_rev(revs, weight, runs).is_finite());
    }
}

// ── PID ───────────────────────────────────────────────────────

proptest! {
    /// Duty stays within the PWM band and the integral within its limit
    /// for any sequence of readings.
    #[test]
    fn pid_output_is_bounded(
        steps in proptest::collection::vec((0.0f32..1000.0, 0.0f32..1000.0), 1..200),
    ) {
        let config = ControllerConfig::default();
        let mut pid = PidController::from_config(&config);
        for (target, actual) in steps {
            let out = pid.compute(target, actual);
            prop_assert!(out.duty == 0 || out.duty >= config.min_pwm);
            prop_assert!(out.duty <= config.max_pwm);
            prop_assert!(pid.integral().abs() <= config.integral_limit);
        }
    }

    /// A sustained positive error winds the integral up monotonically
    /// until it sits on the clamp.
    #[test]
    fn sustained_error_winds_integral_to_limit(error in 1.0f32..500.0) {
        let config = ControllerConfig::default();
        let mut pid = PidController::from_config(&config);
        let mut prev = pid.integral();
        for _ in 0..1100 {
            pid.compute(error, 0.0);
            prop_assert!(pid.integral() >= prev);
            prev = pid.integral();
        }
        prop_assert_eq!(pid.integral(), config.integral_limit);
    }
}

// ── Encoder ───────────────────────────────────────────────────

proptest! {
    /// Any step under half the counter range is recovered exactly across
    /// the i16 wrap.
    #[test]
    fn counter_delta_survives_wrap(start in any::<i16>(), step in -32_767i32..=32_767) {
        let end = (i32::from(start) + step) as i16;
        prop_assert_eq!(counter_delta(start, end), step);
    }

    /// Draining every tick loses nothing, in either direction.
    #[test]
    fn tracker_total_matches_pulses_fed(
        ticks in proptest::collection::vec(-200i16..=200, 1..500),
    ) {
        let mut counter = Register(0);
        let config = ControllerConfig::default();
        let mut tracker = PulseRateTracker::begin(&config, 0, &mut counter);
        let mut fed = 0i64;
        for (i, n) in ticks.iter().enumerate() {
            counter.0 = counter.0.wrapping_add(*n);
            fed += i64::from(*n);
            tracker.update((i as u64 + 1) * 10, &mut counter);
        }
        let ppr = i64::from(config.pulses_per_rev);
        prop_assert_eq!(tracker.completed_revolutions(), fed.div_euclid(ppr));
        prop_assert_eq!(tracker.remainder_pulses(), fed.rem_euclid(ppr));
    }
}

struct Register(i16);

impl PulseCounterPort for Register {
    fn read_count(&mut self) -> i16 {
        self.0
    }

    fn clear_count(&mut self) {
        self.0 = 0;
    }
}

// ── Wire ──────────────────────────────────────────────────────

proptest! {
    /// The decoder never panics on arbitrary input.
    #[test]
    fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let _ = Packet::decode(&bytes);
        let _ = StatusPacket::decode(&bytes);
    }
}
