//! PID controller for metering-shaft speed
//!
//! Discrete proportional-integral-derivative controller mapping an RPM
//! error onto an 8-bit motor duty.  The loop runs at a fixed cadence, so
//! the integral is a plain sum and the derivative a plain first
//! difference of the error between calls.

use crate::config::ControllerConfig;

/// Where the output landed relative to the drive's usable PWM band.
///
/// The fault state machine keys its deadband / saturation transitions off
/// this classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Saturation {
    /// Output is zero; the motor is not driven.
    Off,
    /// Positive output below `min_pwm`, lifted to `min_pwm`.
    Deadband,
    /// Output above `max_pwm`, clamped to `max_pwm`.
    Ceiling,
    /// Strictly inside `(min_pwm, max_pwm)`.
    Linear,
    /// Exactly on `min_pwm` or `max_pwm` without clamping.
    Edge,
}

/// One controller step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidOutput {
    /// Motor duty after clamping and deadband lift.
    pub duty: u8,
    /// Unclamped `P + I + D` sum.
    pub raw: f32,
    pub saturation: Saturation,
}

/// PID controller
pub struct PidController {
    kp: f32,
    ki: f32,
    kd: f32,
    integral_limit: f32,
    min_pwm: f32,
    max_pwm: f32,
    integral: f32,
    prev_error: f32,
    last_output: f32,
}

impl PidController {
    pub fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral_limit: 1000.0,
            min_pwm: 30.0,
            max_pwm: 255.0,
            integral: 0.0,
            prev_error: 0.0,
            last_output: 0.0,
        }
    }

    /// Build with gains and limits from the controller config.
    pub fn from_config(config: &ControllerConfig) -> Self {
        let mut pid = Self::new(config.kp, config.ki, config.kd);
        pid.set_limits(f32::from(config.min_pwm), f32::from(config.max_pwm));
        pid.integral_limit = config.integral_limit.abs();
        pid
    }

    /// Swap gains and limits in place; accumulated state is kept.
    pub fn retune(&mut self, config: &ControllerConfig) {
        self.kp = config.kp;
        self.ki = config.ki;
        self.kd = config.kd;
        self.integral_limit = config.integral_limit.abs();
        self.set_limits(f32::from(config.min_pwm), f32::from(config.max_pwm));
        self.integral = self.integral.clamp(-self.integral_limit, self.integral_limit);
    }

    /// Set the deadband floor and PWM ceiling
    pub fn set_limits(&mut self, min_pwm: f32, max_pwm: f32) {
        self.min_pwm = min_pwm;
        self.max_pwm = max_pwm;
    }

    /// Compute the motor duty for `target_rpm` given `actual_rpm`.
    pub fn compute(&mut self, target_rpm: f32, actual_rpm: f32) -> PidOutput {
        let error = target_rpm - actual_rpm;
        // A non-finite reading must not poison the accumulator
        let error = if error.is_finite() { error } else { 0.0 };

        // Integral (clamped anti-windup)
        self.integral = (self.integral + error).clamp(-self.integral_limit, self.integral_limit);

        // Derivative (per call, no time normalisation)
        let derivative = error - self.prev_error;
        self.prev_error = error;

        let raw = self.kp * error + self.ki * self.integral + self.kd * derivative;

        let (output, saturation) = if raw <= 0.0 {
            (0.0, Saturation::Off)
        } else if raw > self.max_pwm {
            (self.max_pwm, Saturation::Ceiling)
        } else if raw < self.min_pwm {
            (self.min_pwm, Saturation::Deadband)
        } else if raw > self.min_pwm && raw < self.max_pwm {
            (raw, Saturation::Linear)
        } else {
            (raw, Saturation::Edge)
        };

        self.last_output = output;
        PidOutput {
            duty: output as u8,
            raw,
            saturation,
        }
    }

    /// Current integral accumulator.
    pub fn integral(&self) -> f32 {
        self.integral
    }

    /// Output of the most recent step.
    pub fn last_output(&self) -> f32 {
        self.last_output
    }
}
