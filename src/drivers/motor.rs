//! Metering motor driver (single-direction H-bridge).
//!
//! 8-bit speed via LEDC PWM (ch0) with the direction pin held forward.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives real PWM and GPIO via hw_init helpers.
//! On host/test: tracks state in-memory only.

use crate::app::ports::MotorCutoff;
use crate::drivers::hw_init;
use crate::pins;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorState {
    Stopped,
    Running { duty: u8 },
}

pub struct MotorDriver {
    state: MotorState,
}

impl Default for MotorDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MotorDriver {
    pub fn new() -> Self {
        hw_init::gpio_write(pins::MOTOR_DIR_GPIO, true);
        Self {
            state: MotorState::Stopped,
        }
    }

    pub fn set(&mut self, duty: u8) {
        if duty == 0 {
            self.stop();
            return;
        }
        hw_init::ledc_set(hw_init::LEDC_CH_MOTOR, duty);
        self.state = MotorState::Running { duty };
    }

    pub fn stop(&mut self) {
        hw_init::ledc_set(hw_init::LEDC_CH_MOTOR, 0);
        self.state = MotorState::Stopped;
    }

    pub fn state(&self) -> MotorState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        !matches!(self.state, MotorState::Stopped)
    }

    pub fn current_duty(&self) -> u8 {
        match self.state {
            MotorState::Stopped => 0,
            MotorState::Running { duty } => duty,
        }
    }
}

/// Zero-sized kill switch for the stall monitor thread: writes duty 0
/// straight to the LEDC channel without touching [`MotorDriver`] state.
#[derive(Debug, Clone, Copy, Default)]
pub struct LedcCutoff;

impl MotorCutoff for LedcCutoff {
    fn cut(&self) {
        hw_init::ledc_set(hw_init::LEDC_CH_MOTOR, 0);
    }
}
