//! Calibration and pairing state that survives a reboot.
//!
//! Two NVS namespaces, each a handful of little-endian scalars plus a
//! `valid` byte written last:
//!
//! | Namespace     | Keys                                              |
//! |---------------|---------------------------------------------------|
//! | `calibration` | `seedPerRev`, `calRevs`, `calWeight`, `targetRate`, `valid` |
//! | `pairing`     | `peerAddr` (6 B), `paired`, `valid`               |
//!
//! A namespace without `valid == 1` loads as "nothing stored".  Clearing
//! drops `valid` first so an interrupted clear never looks valid.

use log::{info, warn};

use crate::app::ports::{StorageError, StoragePort};
use crate::config::ControlConfig;
use crate::link::pairing::PeerIdentity;

pub const CALIBRATION_NS: &str = "calibration";
pub const PAIRING_NS: &str = "pairing";

const KEY_VALID: &str = "valid";
const KEY_SEED_PER_REV: &str = "seedPerRev";
const KEY_CAL_REVS: &str = "calRevs";
const KEY_CAL_WEIGHT: &str = "calWeight";
const KEY_TARGET_RATE: &str = "targetRate";
const KEY_PEER_ADDR: &str = "peerAddr";
const KEY_PAIRED: &str = "paired";

/// Calibration result plus the operator values it was taken with.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CalibrationRecord {
    pub seed_per_rev: f32,
    /// Revolutions counted during the calibration catch
    pub cal_revs: f32,
    pub cal_weight: f32,
    pub target_rate: f32,
}

impl CalibrationRecord {
    pub fn from_control(control: &ControlConfig, cal_revs: f32) -> Self {
        Self {
            seed_per_rev: control.seed_per_rev,
            cal_revs,
            cal_weight: control.calibration_weight,
            target_rate: control.target_rate,
        }
    }

    pub fn apply(&self, control: &mut ControlConfig) {
        control.seed_per_rev = self.seed_per_rev;
        control.calibration_weight = self.cal_weight;
        control.target_rate = self.target_rate;
    }
}

// ── Calibration ───────────────────────────────────────────────

pub fn load_calibration(storage: &impl StoragePort) -> Result<Option<CalibrationRecord>, StorageError> {
    if !is_valid(storage, CALIBRATION_NS)? {
        return Ok(None);
    }
    Ok(Some(CalibrationRecord {
        seed_per_rev: read_f32(storage, CALIBRATION_NS, KEY_SEED_PER_REV)?,
        cal_revs: read_f32(storage, CALIBRATION_NS, KEY_CAL_REVS)?,
        cal_weight: read_f32(storage, CALIBRATION_NS, KEY_CAL_WEIGHT)?,
        target_rate: read_f32(storage, CALIBRATION_NS, KEY_TARGET_RATE)?,
    }))
}

pub fn save_calibration(storage: &mut impl StoragePort, rec: &CalibrationRecord) -> Result<(), StorageError> {
    storage.write(CALIBRATION_NS, KEY_SEED_PER_REV, &rec.seed_per_rev.to_le_bytes())?;
    storage.write(CALIBRATION_NS, KEY_CAL_REVS, &rec.cal_revs.to_le_bytes())?;
    storage.write(CALIBRATION_NS, KEY_CAL_WEIGHT, &rec.cal_weight.to_le_bytes())?;
    storage.write(CALIBRATION_NS, KEY_TARGET_RATE, &rec.target_rate.to_le_bytes())?;
    storage.write(CALIBRATION_NS, KEY_VALID, &[1])?;
    info!("Persist: calibration saved (seed/rev {:.5})", rec.seed_per_rev);
    Ok(())
}

pub fn clear_calibration(storage: &mut impl StoragePort) -> Result<(), StorageError> {
    clear_namespace(
        storage,
        CALIBRATION_NS,
        &[KEY_SEED_PER_REV, KEY_CAL_REVS, KEY_CAL_WEIGHT, KEY_TARGET_RATE],
    )
}

// ── Pairing ───────────────────────────────────────────────────

pub fn load_peer(storage: &impl StoragePort) -> Result<Option<PeerIdentity>, StorageError> {
    if !is_valid(storage, PAIRING_NS)? {
        return Ok(None);
    }
    let mut addr = [0u8; 6];
    read_exact(storage, PAIRING_NS, KEY_PEER_ADDR, &mut addr)?;
    let mut paired = [0u8; 1];
    read_exact(storage, PAIRING_NS, KEY_PAIRED, &mut paired)?;
    Ok(Some(PeerIdentity {
        addr,
        paired: paired[0] != 0,
    }))
}

pub fn save_peer(storage: &mut impl StoragePort, peer: &PeerIdentity) -> Result<(), StorageError> {
    storage.write(PAIRING_NS, KEY_PEER_ADDR, &peer.addr)?;
    storage.write(PAIRING_NS, KEY_PAIRED, &[u8::from(peer.paired)])?;
    storage.write(PAIRING_NS, KEY_VALID, &[1])?;
    info!("Persist: peer saved");
    Ok(())
}

pub fn clear_peer(storage: &mut impl StoragePort) -> Result<(), StorageError> {
    clear_namespace(storage, PAIRING_NS, &[KEY_PEER_ADDR, KEY_PAIRED])
}

// ── Helpers ───────────────────────────────────────────────────

fn is_valid(storage: &impl StoragePort, ns: &str) -> Result<bool, StorageError> {
    let mut flag = [0u8; 1];
    match read_exact(storage, ns, KEY_VALID, &mut flag) {
        Ok(()) => Ok(flag[0] == 1),
        Err(StorageError::NotFound) => Ok(false),
        Err(e) => Err(e),
    }
}

fn read_exact(storage: &impl StoragePort, ns: &str, key: &str, out: &mut [u8]) -> Result<(), StorageError> {
    let len = storage.read(ns, key, out)?;
    if len != out.len() {
        warn!("Persist: {}::{} has {} bytes, expected {}", ns, key, len, out.len());
        return Err(StorageError::Malformed);
    }
    Ok(())
}

fn read_f32(storage: &impl StoragePort, ns: &str, key: &str) -> Result<f32, StorageError> {
    let mut buf = [0u8; 4];
    read_exact(storage, ns, key, &mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn clear_namespace(storage: &mut impl StoragePort, ns: &str, keys: &[&str]) -> Result<(), StorageError> {
    storage.delete(ns, KEY_VALID)?;
    for key in keys {
        storage.delete(ns, key)?;
    }
    info!("Persist: {} cleared", ns);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::nvs::NvsAdapter;

    fn store() -> NvsAdapter {
        NvsAdapter::new().unwrap()
    }

    #[test]
    fn empty_store_loads_nothing() {
        let s = store();
        assert_eq!(load_calibration(&s), Ok(None));
        assert_eq!(load_peer(&s), Ok(None));
    }

    #[test]
    fn calibration_round_trip() {
        let mut s = store();
        let rec = CalibrationRecord {
            seed_per_rev: 0.0495,
            cal_revs: 80.8,
            cal_weight: 0.5,
            target_rate: 12.0,
        };
        save_calibration(&mut s, &rec).unwrap();
        assert_eq!(load_calibration(&s), Ok(Some(rec)));
    }

    #[test]
    fn peer_round_trip_and_clear() {
        let mut s = store();
        let peer = PeerIdentity::paired([0x24, 0x6F, 0x28, 1, 2, 3]);
        save_peer(&mut s, &peer).unwrap();
        assert_eq!(load_peer(&s), Ok(Some(peer)));
        clear_peer(&mut s).unwrap();
        assert_eq!(load_peer(&s), Ok(None));
        let mut buf = [0u8; 6];
        assert_eq!(s.read(PAIRING_NS, KEY_PEER_ADDR, &mut buf), Err(StorageError::NotFound));
    }

    #[test]
    fn values_without_valid_flag_are_ignored() {
        let mut s = store();
        s.write(CALIBRATION_NS, KEY_SEED_PER_REV, &1.0f32.to_le_bytes()).unwrap();
        assert_eq!(load_calibration(&s), Ok(None));
    }

    #[test]
    fn wrong_width_value_is_malformed() {
        let mut s = store();
        save_calibration(&mut s, &CalibrationRecord::default()).unwrap();
        s.write(CALIBRATION_NS, KEY_CAL_WEIGHT, &[0, 0]).unwrap();
        assert_eq!(load_calibration(&s), Err(StorageError::Malformed));
    }

    #[test]
    fn record_applies_to_control() {
        let rec = CalibrationRecord {
            seed_per_rev: 0.05,
            cal_revs: 100.0,
            cal_weight: 0.625,
            target_rate: 10.0,
        };
        let mut c = ControlConfig::default();
        rec.apply(&mut c);
        assert_eq!(c.seed_per_rev, 0.05);
        assert_eq!(c.calibration_weight, 0.625);
        assert_eq!(c.target_rate, 10.0);
        assert_eq!(CalibrationRecord::from_control(&c, 100.0), rec);
    }
}
