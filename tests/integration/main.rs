//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  All tests run on the host (x86_64) with no
//! real hardware required.

// Host builds take the critical-section impl from the `std` feature.
use critical_section as _;

mod calibration_tests;
mod control_loop_tests;
mod fault_tests;
mod mock_hw;
mod pairing_tests;
