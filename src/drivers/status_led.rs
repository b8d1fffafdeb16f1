//! Power and calibration indicator LEDs.
//!
//! Two plain GPIO outputs, active-high.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: writes the pins via hw_init.
//! On host/test: tracks state in-memory only.

use crate::drivers::hw_init;
use crate::pins;

pub struct StatusLeds {
    power: bool,
    cal: bool,
}

impl Default for StatusLeds {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusLeds {
    pub fn new() -> Self {
        Self {
            power: false,
            cal: false,
        }
    }

    pub fn set_power(&mut self, on: bool) {
        if on != self.power {
            hw_init::gpio_write(pins::POWER_LED_GPIO, on);
            self.power = on;
        }
    }

    /// Written on every change only; the control loop calls this each tick.
    pub fn set_cal(&mut self, on: bool) {
        if on != self.cal {
            hw_init::gpio_write(pins::CAL_LED_GPIO, on);
            self.cal = on;
        }
    }

    pub fn off(&mut self) {
        self.set_power(false);
        self.set_cal(false);
    }

    pub fn state(&self) -> (bool, bool) {
        (self.power, self.cal)
    }
}
