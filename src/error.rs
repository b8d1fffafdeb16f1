//! Unified error types for the seedmeter firmware.
//!
//! A single `Error` enum that every subsystem error converts into, keeping
//! boot-time error handling uniform.  All variants are `Copy` so they pass
//! through the link layer and log lines without allocation.  Drive faults
//! are not errors; they live in [`FaultCode`].

use core::fmt;

use crate::app::ports::{ConfigError, StorageError};
use crate::drivers::hw_init::HwInitError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible bring-up step in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Peripheral initialisation failed.
    Init(HwInitError),
    /// The radio link failed.
    Link(LinkError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Persisted calibration or pairing state could not be accessed.
    Storage(StorageError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(e) => write!(f, "init: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
        }
    }
}

impl core::error::Error for Error {}

impl From<HwInitError> for Error {
    fn from(e: HwInitError) -> Self {
        Self::Init(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Link errors
// ---------------------------------------------------------------------------

/// Radio link failures.  Logged by callers, never retried beyond the
/// fixed stall burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// Radio stack could not be brought up.
    InitFailed(i32),
    /// Peer registration was rejected.
    PeerRejected(i32),
    /// A send call returned an error.
    SendFailed(i32),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitFailed(rc) => write!(f, "radio init failed (rc={rc})"),
            Self::PeerRejected(rc) => write!(f, "peer rejected (rc={rc})"),
            Self::SendFailed(rc) => write!(f, "send failed (rc={rc})"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Fault codes
// ---------------------------------------------------------------------------

/// Drive fault codes as reported in the status packet.
///
/// Codes 1 and 2 are informational and clear themselves once the PID
/// output is back in its linear range.  Code 3 latches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FaultCode {
    #[default]
    None = 0,
    /// PID output lifted to the minimum duty.
    MinPwmDeadband = 1,
    /// PID output clamped at the PWM ceiling.
    MaxPwmSaturation = 2,
    /// Shaft not turning while the work switch is engaged.
    ShaftStall = 3,
}

impl FaultCode {
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decode a wire code.  Unknown codes map to `None`.
    pub const fn from_code(code: u8) -> Self {
        match code {
            1 => Self::MinPwmDeadband,
            2 => Self::MaxPwmSaturation,
            3 => Self::ShaftStall,
            _ => Self::None,
        }
    }

    pub const fn is_latched(self) -> bool {
        matches!(self, Self::ShaftStall)
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::MinPwmDeadband => write!(f, "min PWM deadband"),
            Self::MaxPwmSaturation => write!(f, "max PWM saturation"),
            Self::ShaftStall => write!(f, "shaft stall"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
