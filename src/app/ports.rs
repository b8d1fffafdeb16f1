//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (encoder counter, switches, GPS UART, motor, radio,
//! event sinks, storage) implement these traits.  The [`AppService`](super::service::AppService)
//! and the stall guard consume them via generics, so the domain core never
//! touches hardware directly.
//!
//! ## Threading
//!
//! [`LinkPort`] and [`MotorCutoff`] take `&self`: the stall monitor thread
//! and the control loop both hold them.  Everything else is owned by the
//! control loop (or, for [`GpsSource`], by the GPS task) and takes
//! `&mut self`.

use crate::config::ControllerConfig;
use crate::error::LinkError;

// ───────────────────────────────────────────────────────────────
// Sensor ports (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// The shaft encoder's hardware pulse counter.
pub trait PulseCounterPort {
    /// Signed 16-bit count since the last clear.
    fn read_count(&mut self) -> i16;

    /// Zero the counter.
    fn clear_count(&mut self);
}

/// Raw digital inputs.  `true` means "active" (the electrical polarity is
/// the adapter's concern).  Debouncing happens in the domain.
pub trait InputPort {
    /// Implement (planter) lowered / work switch closed.
    fn work_switch(&mut self) -> bool;

    /// Calibration "prime" button held.
    fn cal_button(&mut self) -> bool;

    /// BOOT / pairing button held.
    fn pair_button(&mut self) -> bool;
}

/// Raw byte stream from the GPS receiver.
pub trait GpsSource: Send {
    /// Copy whatever bytes have arrived into `buf`, waiting at most a
    /// short driver timeout.  Returns the number of bytes copied.
    fn read(&mut self, buf: &mut [u8]) -> usize;
}

// ───────────────────────────────────────────────────────────────
// Actuator ports (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to command actuators.
pub trait ActuatorPort {
    /// Set motor PWM duty (0–255), forward direction.
    fn set_motor(&mut self, duty: u8);

    /// Immediately stop the motor.
    fn stop_motor(&mut self);

    fn set_power_led(&mut self, on: bool);

    fn set_cal_led(&mut self, on: bool);
}

/// Motor kill path usable from the stall monitor thread.
pub trait MotorCutoff: Send {
    /// Force motor PWM to zero now.
    fn cut(&self);
}

// ───────────────────────────────────────────────────────────────
// Link port (driven adapter: domain ↔ radio)
// ───────────────────────────────────────────────────────────────

/// Datagram transport to the screen.  Sends are fire-and-forget: the
/// caller logs failures and never retries.
pub trait LinkPort: Send + Sync {
    fn send(&self, addr: &[u8; 6], data: &[u8]) -> Result<(), LinkError>;

    /// Make `addr` a known unicast peer.
    fn register_peer(&self, addr: &[u8; 6]) -> Result<(), LinkError>;

    /// Forget a previously registered peer.
    fn unregister_peer(&self, addr: &[u8; 6]) -> Result<(), LinkError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the tuning configuration.
///
/// Implementations MUST validate before persisting and reject invalid
/// ranges with [`ConfigError::ValidationFailed`] rather than clamping.
pub trait ConfigPort {
    /// Returns [`ControllerConfig::default()`] if nothing is stored.
    fn load(&self) -> Result<ControllerConfig, ConfigError>;

    fn save(&self, config: &ControllerConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Namespaced key-value storage.
///
/// Writes MUST be atomic per key.  The ESP-IDF NVS API guarantees this
/// natively; the in-memory simulation achieves it trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
    /// Stored value has the wrong size or an invalid encoding.
    Malformed,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::Malformed => write!(f, "malformed value"),
        }
    }
}
