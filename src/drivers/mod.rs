//! Motor and LED drivers, hardware initialisation, and peripheral helpers.

pub mod button;
pub mod hw_init;
pub mod motor;
pub mod status_led;
pub mod task_pin;
pub mod watchdog;
