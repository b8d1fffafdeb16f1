//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the seedmeter
//! controller on top of four blob primitives (length, get, set, erase).
//! On ESP-IDF they open the namespace per call and commit every write;
//! on the host they hit an in-memory map keyed `namespace::key`.
//!
//! Tuning config is a postcard blob under `seedmeter/ctrlcfg` and is
//! range-checked before it is written.

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::ControllerConfig;
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "seedmeter";
const CONFIG_KEY: &str = "ctrlcfg";
const MAX_BLOB_SIZE: usize = 512;

/// Backend failure: a missing key, or the raw ESP-IDF error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlobError {
    NotFound,
    Io(i32),
}

impl From<BlobError> for StorageError {
    fn from(e: BlobError) -> Self {
        match e {
            BlobError::NotFound => Self::NotFound,
            BlobError::Io(_) => Self::IoError,
        }
    }
}

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Initialise NVS flash.  A full or outdated partition is erased and
    /// re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called from the main task before any other NVS access.
            let mut ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                ret = unsafe { nvs_flash_init() };
            }
            if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }
}

// ── Blob primitives (host) ────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl NvsAdapter {
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    fn blob_len(&self, namespace: &str, key: &str) -> Result<usize, BlobError> {
        self.store
            .borrow()
            .get(&Self::composite_key(namespace, key))
            .map(Vec::len)
            .ok_or(BlobError::NotFound)
    }

    fn blob_get(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, BlobError> {
        let store = self.store.borrow();
        let data = store.get(&Self::composite_key(namespace, key)).ok_or(BlobError::NotFound)?;
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    fn blob_set(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), BlobError> {
        self.store.borrow_mut().insert(Self::composite_key(namespace, key), data.to_vec());
        Ok(())
    }

    fn blob_erase(&self, namespace: &str, key: &str) -> Result<(), BlobError> {
        self.store.borrow_mut().remove(&Self::composite_key(namespace, key));
        Ok(())
    }
}

// ── Blob primitives (ESP-IDF) ─────────────────────────────────

/// NUL-terminated copy of a namespace or key (NVS caps both at 15 chars).
#[cfg(target_os = "espidf")]
fn c_name(name: &str) -> [u8; 16] {
    let mut out = [0u8; 16];
    let n = name.len().min(15);
    out[..n].copy_from_slice(&name.as_bytes()[..n]);
    out
}

#[cfg(target_os = "espidf")]
fn check(ret: esp_err_t) -> Result<(), BlobError> {
    match ret {
        ESP_OK => Ok(()),
        ESP_ERR_NVS_NOT_FOUND => Err(BlobError::NotFound),
        other => Err(BlobError::Io(other)),
    }
}

#[cfg(target_os = "espidf")]
impl NvsAdapter {
    /// Open `namespace`, run `f` with the handle, close it again.
    fn with_handle<T>(
        namespace: &str,
        write: bool,
        f: impl FnOnce(nvs_handle_t) -> Result<T, BlobError>,
    ) -> Result<T, BlobError> {
        let ns = c_name(namespace);
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        // SAFETY: `ns` is NUL-terminated and outlives the call.
        check(unsafe { nvs_open(ns.as_ptr().cast(), mode, &mut handle) })?;
        let result = f(handle);
        // SAFETY: handle was opened above and is not used afterwards.
        unsafe { nvs_close(handle) };
        result
    }

    fn blob_len(&self, namespace: &str, key: &str) -> Result<usize, BlobError> {
        let key = c_name(key);
        Self::with_handle(namespace, false, |h| {
            let mut size = 0usize;
            // SAFETY: a null out-pointer asks NVS for the stored length only.
            check(unsafe { nvs_get_blob(h, key.as_ptr().cast(), core::ptr::null_mut(), &mut size) })?;
            Ok(size)
        })
    }

    fn blob_get(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, BlobError> {
        let key = c_name(key);
        Self::with_handle(namespace, false, |h| {
            let mut size = buf.len();
            // SAFETY: NVS writes at most `size` bytes into `buf`.
            check(unsafe { nvs_get_blob(h, key.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size) })?;
            Ok(size)
        })
    }

    fn blob_set(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), BlobError> {
        let key = c_name(key);
        Self::with_handle(namespace, true, |h| {
            // SAFETY: `data` is valid for `data.len()` bytes.
            check(unsafe { nvs_set_blob(h, key.as_ptr().cast(), data.as_ptr().cast(), data.len()) })?;
            check(unsafe { nvs_commit(h) })
        })
    }

    fn blob_erase(&self, namespace: &str, key: &str) -> Result<(), BlobError> {
        let key = c_name(key);
        Self::with_handle(namespace, true, |h| {
            // SAFETY: plain key erase on an open read-write handle.
            match check(unsafe { nvs_erase_key(h, key.as_ptr().cast()) }) {
                Ok(()) | Err(BlobError::NotFound) => {}
                Err(e) => return Err(e),
            }
            check(unsafe { nvs_commit(h) })
        })
    }
}

fn validate_config(cfg: &ControllerConfig) -> Result<(), ConfigError> {
    let gains = [cfg.kp, cfg.ki, cfg.kd];
    if gains.iter().any(|g| !g.is_finite() || *g < 0.0 || *g > 100.0) {
        return Err(ConfigError::ValidationFailed("PID gains must be 0.0–100.0"));
    }
    if !(1.0..=100_000.0).contains(&cfg.integral_limit) {
        return Err(ConfigError::ValidationFailed(
            "integral_limit must be 1.0–100000.0",
        ));
    }
    if cfg.max_pwm == 0 {
        return Err(ConfigError::ValidationFailed("max_pwm must be > 0"));
    }
    if cfg.min_pwm >= cfg.max_pwm {
        return Err(ConfigError::ValidationFailed("min_pwm must be < max_pwm"));
    }
    if !(1..=65_536).contains(&cfg.pulses_per_rev) {
        return Err(ConfigError::ValidationFailed(
            "pulses_per_rev must be 1–65536",
        ));
    }
    if !(50..=2000).contains(&cfg.rpm_sample_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "rpm_sample_interval_ms must be 50–2000",
        ));
    }
    if cfg.moving_timeout_ms < cfg.rpm_sample_interval_ms {
        return Err(ConfigError::ValidationFailed(
            "moving_timeout_ms must be >= rpm_sample_interval_ms",
        ));
    }
    if !(cfg.stall_rpm_threshold.is_finite() && cfg.stall_rpm_threshold >= 0.0) {
        return Err(ConfigError::ValidationFailed(
            "stall_rpm_threshold must be finite and >= 0",
        ));
    }
    if !(1..=100).contains(&cfg.stall_sample_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "stall_sample_interval_ms must be 1–100",
        ));
    }
    if !(1..=100).contains(&cfg.control_loop_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "control_loop_interval_ms must be 1–100",
        ));
    }
    if cfg.status_interval_ms < cfg.control_loop_interval_ms {
        return Err(ConfigError::ValidationFailed(
            "status_interval_ms must be >= control_loop_interval_ms",
        ));
    }
    if !(1..=10).contains(&cfg.fault_burst_count) {
        return Err(ConfigError::ValidationFailed(
            "fault_burst_count must be 1–10",
        ));
    }
    if cfg.forget_hold_ms <= cfg.pairing_hold_ms {
        return Err(ConfigError::ValidationFailed(
            "forget_hold_ms must be > pairing_hold_ms",
        ));
    }
    if !(-12..=14).contains(&cfg.utc_offset_hours) {
        return Err(ConfigError::ValidationFailed(
            "utc_offset_hours must be -12–14",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<ControllerConfig, ConfigError> {
        let size = match self.blob_len(CONFIG_NAMESPACE, CONFIG_KEY) {
            Ok(size) => size,
            Err(BlobError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                return Ok(ControllerConfig::default());
            }
            Err(e) => {
                warn!("NvsAdapter: config read error {:?}, using defaults", e);
                return Ok(ControllerConfig::default());
            }
        };
        if size == 0 || size > MAX_BLOB_SIZE {
            return Err(ConfigError::Corrupted);
        }

        let mut buf = vec![0u8; size];
        let n = self
            .blob_get(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf)
            .map_err(|_| ConfigError::IoError)?;
        let cfg: ControllerConfig = postcard::from_bytes(&buf[..n]).map_err(|_| ConfigError::Corrupted)?;
        info!("NvsAdapter: loaded config ({} bytes)", n);
        Ok(cfg)
    }

    fn save(&self, config: &ControllerConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.blob_set(CONFIG_NAMESPACE, CONFIG_KEY, &bytes).map_err(|e| {
            warn!("NvsAdapter: config write error {:?}", e);
            ConfigError::IoError
        })?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        Ok(self.blob_get(namespace, key, buf)?)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        Ok(self.blob_set(namespace, key, data)?)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        Ok(self.blob_erase(namespace, key)?)
    }
}

impl Default for NvsAdapter {
    fn default() -> Self {
        // Falls back to an unopened adapter; NVS calls then report I/O errors.
        Self::new().unwrap_or_else(|_| Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }
}
