//! Local commands to the application service.
//!
//! Screen traffic arrives as packets on the inbound channel; these are
//! the requests that come from the firmware itself.  The buttons reach
//! the same paths: a 10 s pair-button hold forgets the peer and CAL held
//! at power-on clears the calibration (see `AppService::boot_buttons`).

use crate::config::ControllerConfig;

/// Commands that local adapters can send into the application core.
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Drop the paired screen and return to broadcast.
    ForgetPeer,

    /// Erase the stored calibration; seed-per-rev returns to 0.
    ClearCalibration,

    /// Hot-reload tuning configuration.
    UpdateConfig(ControllerConfig),

    /// Persist the current tuning configuration immediately.
    SaveConfig,
}
