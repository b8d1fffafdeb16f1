//! Shaft and operator-input sensing.
//!
//! - [`encoder`]: pulse counter → revolutions and smoothed RPM.
//! - [`switch`]: debouncer for the work switch and calibration button.

pub mod encoder;
pub mod switch;
