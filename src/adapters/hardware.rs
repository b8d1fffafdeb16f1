//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the motor and LED drivers and reads the encoder counter and
//! operator inputs, exposing them through [`PulseCounterPort`],
//! [`InputPort`] and [`ActuatorPort`].  This is the only module in the
//! system that touches actual hardware.  On non-espidf targets, the
//! underlying drivers use cfg-gated simulation stubs.

use crate::app::ports::{ActuatorPort, InputPort, PulseCounterPort};
use crate::drivers::hw_init;
use crate::drivers::motor::MotorDriver;
use crate::drivers::status_led::StatusLeds;
use crate::pins;

/// Concrete adapter that combines all control-loop hardware.
pub struct HardwareAdapter {
    motor: MotorDriver,
    leds: StatusLeds,
}

impl Default for HardwareAdapter {
    fn default() -> Self {
        Self::new(MotorDriver::new(), StatusLeds::new())
    }
}

impl HardwareAdapter {
    pub fn new(motor: MotorDriver, leds: StatusLeds) -> Self {
        Self { motor, leds }
    }

    /// Kill every output.
    pub fn all_off(&mut self) {
        self.motor.stop();
        self.leds.off();
    }
}

// ── PulseCounterPort implementation ───────────────────────────

impl PulseCounterPort for HardwareAdapter {
    fn read_count(&mut self) -> i16 {
        hw_init::pcnt_read()
    }

    fn clear_count(&mut self) {
        hw_init::pcnt_clear();
    }
}

// ── InputPort implementation ──────────────────────────────────

// All inputs are active-low behind pull-ups.
impl InputPort for HardwareAdapter {
    fn work_switch(&mut self) -> bool {
        !hw_init::gpio_read(pins::WORK_SWITCH_GPIO)
    }

    fn cal_button(&mut self) -> bool {
        !hw_init::gpio_read(pins::CAL_BUTTON_GPIO)
    }

    fn pair_button(&mut self) -> bool {
        !hw_init::gpio_read(pins::PAIR_BUTTON_GPIO)
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl ActuatorPort for HardwareAdapter {
    fn set_motor(&mut self, duty: u8) {
        self.motor.set(duty);
    }

    fn stop_motor(&mut self) {
        self.motor.stop();
    }

    fn set_power_led(&mut self, on: bool) {
        self.leds.set_power(on);
    }

    fn set_cal_led(&mut self, on: bool) {
        self.leds.set_cal(on);
    }
}
