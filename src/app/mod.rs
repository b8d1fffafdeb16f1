//! Application core: domain orchestration, zero direct I/O.
//!
//! This module contains the control-cycle rules for the metering drive:
//! packet application, pairing, rate control and motor selection.  All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
