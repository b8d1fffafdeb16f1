//! Controller configuration parameters
//!
//! Two layers:
//!
//! - [`ControllerConfig`] holds the tuning constants that are fixed per
//!   physical install (PID gains, PWM limits, encoder geometry, timing).
//!   Persisted as a postcard blob through `ConfigPort`.
//! - [`ControlConfig`] holds the values the paired screen overwrites at
//!   runtime (target rate, calibration flags, test overrides).  It is
//!   `Copy` so the control loop and stall monitor can take cheap snapshots
//!   out of [`SharedState`](crate::shared::SharedState).

use serde::{Deserialize, Serialize};

/// Tuning constants for the drive controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    // --- PID ---
    /// Proportional gain
    pub kp: f32,
    /// Integral gain
    pub ki: f32,
    /// Derivative gain (applied to the per-call error difference)
    pub kd: f32,
    /// Symmetric clamp for the integral accumulator
    pub integral_limit: f32,
    /// Lowest duty at which the motor reliably turns
    pub min_pwm: u8,
    /// PWM ceiling (8-bit LEDC)
    pub max_pwm: u8,

    // --- Encoder ---
    /// Encoder pulses per metering-shaft revolution
    pub pulses_per_rev: u32,
    /// Outer RPM recomputation interval (milliseconds)
    pub rpm_sample_interval_ms: u32,
    /// A pulse within this window means the shaft is moving (milliseconds)
    pub moving_timeout_ms: u32,

    // --- Stall monitor ---
    /// RPM below which an engaged shaft counts as stalled
    pub stall_rpm_threshold: f32,
    /// Stall monitor sampling period (milliseconds)
    pub stall_sample_interval_ms: u32,

    // --- Link ---
    /// Minimum spacing between outbound status packets (milliseconds)
    pub status_interval_ms: u32,
    /// Number of status packets sent when a stall latches
    pub fault_burst_count: u8,
    /// Gap between burst packets (milliseconds)
    pub fault_burst_gap_ms: u32,
    /// Button hold required to enter pairing mode (milliseconds)
    pub pairing_hold_ms: u32,
    /// Pairing mode gives up after this long without a request (milliseconds)
    pub pairing_timeout_ms: u32,
    /// Uninterrupted pair-button hold that forgets the paired screen (milliseconds)
    pub forget_hold_ms: u32,

    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub control_loop_interval_ms: u32,
    /// Telemetry log interval (milliseconds)
    pub telemetry_log_interval_ms: u32,
    /// Offset applied to the GPS UTC hour before it is reported
    pub utc_offset_hours: i8,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            // PID
            kp: 1.2,
            ki: 0.3,
            kd: 0.05,
            integral_limit: 1000.0,
            min_pwm: 30,
            max_pwm: 255,

            // Encoder
            pulses_per_rev: 1024,
            rpm_sample_interval_ms: 200,
            moving_timeout_ms: 500,

            // Stall monitor
            stall_rpm_threshold: 0.1,
            stall_sample_interval_ms: 10,

            // Link
            status_interval_ms: 200,
            fault_burst_count: 3,
            fault_burst_gap_ms: 20,
            pairing_hold_ms: 3000,
            pairing_timeout_ms: 60_000,
            forget_hold_ms: 10_000,

            // Timing
            control_loop_interval_ms: 10,
            telemetry_log_interval_ms: 5000,
            utc_offset_hours: -6, // MDT
        }
    }
}

/// Bounds for the remote-supplied stall window.
pub const STALL_DELAY_MIN_MS: u32 = 100;
pub const STALL_DELAY_MAX_MS: u32 = 10_000;

/// Runtime configuration written by the paired screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Calibration mode active on the screen
    pub calibration_mode: bool,
    /// Target application rate (lb/acre)
    pub target_rate: f32,
    /// Effective implement width (ft)
    pub working_width: f32,
    /// Calibrated mass per shaft revolution (lb/rev); 0 = uncalibrated
    pub seed_per_rev: f32,
    /// Catch runs collected during a calibration
    pub calibration_runs: i32,
    /// Weight caught during calibration (lb)
    pub calibration_weight: f32,
    /// Drive the motor at `motor_test_pwm` regardless of speed
    pub motor_test: bool,
    pub motor_test_pwm: i32,
    /// Replace GPS speed with `speed_test_mph`
    pub speed_test: bool,
    pub speed_test_mph: f32,
    /// Stall monitor enabled
    pub stall_protection: bool,
    /// Continuous low-RPM time before a stall latches (milliseconds)
    pub stall_delay_ms: u32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            calibration_mode: false,
            target_rate: 0.0,
            working_width: 60.0,
            seed_per_rev: 0.0,
            calibration_runs: 8,
            calibration_weight: 0.0,
            motor_test: false,
            motor_test_pwm: 10,
            speed_test: false,
            speed_test_mph: 0.0,
            stall_protection: true,
            stall_delay_ms: 200,
        }
    }
}

impl ControlConfig {
    /// Stall window clamped into the accepted range.
    pub fn stall_window_ms(&self) -> u32 {
        self.stall_delay_ms
            .clamp(STALL_DELAY_MIN_MS, STALL_DELAY_MAX_MS)
    }
}
