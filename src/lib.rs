//! Seed meter controller firmware library.
//!
//! Exposes the pure-logic modules for integration testing and host-side
//! simulation.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod fault;
pub mod gps;
pub mod link;
pub mod persist;
pub mod pins;
pub mod sensors;
pub mod shared;

// The hardware-facing modules compile on the host against the cfg-gated
// simulation stubs inside each driver.
pub mod adapters;
pub mod drivers;

// Host test builds take the critical-section impl from the `std` feature.
#[cfg(test)]
use critical_section as _;
