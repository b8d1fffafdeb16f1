//! Rate-control loop: PID step plus the calibration math feeding it.

pub mod pid;
pub mod rate;
