//! Calibration and application-rate math.
//!
//! Unit conventions: speed in mph, width in feet, rate in lb/acre,
//! calibration constant in lb per shaft revolution.
//!
//! ```text
//!   acres/min = mph × ft / 495
//!   lb/min    = lb/acre × acres/min
//!   rpm       = lb/min / (lb/rev)
//! ```
//!
//! Every function returns `0.0` instead of dividing by zero; an
//! uncalibrated or stationary drive simply asks for no motion.

/// 43 560 ft² per acre divided by 88 ft/min per mph.
const MPH_FT_PER_ACRE_MIN: f32 = 495.0;
const SQFT_PER_ACRE: f32 = 43_560.0;
const FT_PER_MILE: f32 = 5_280.0;

/// Below this ground speed the implement counts as stationary.
pub const STATIONARY_MPH: f32 = 0.1;

/// Material dispensed per shaft revolution from a catch test:
/// `weight × runs / revs`.
pub fn calculate_seed_per_rev(total_revs: f32, calibration_weight: f32, runs: i32) -> f32 {
    if total_revs == 0.0 {
        return 0.0;
    }
    let spr = calibration_weight * runs as f32 / total_revs;
    if spr.is_finite() { spr } else { 0.0 }
}

/// Shaft RPM needed to apply `target_rate` at `speed_mph`.
pub fn calculate_target_shaft_rpm(
    speed_mph: f32,
    target_rate: f32,
    seed_per_rev: f32,
    width_ft: f32,
) -> f32 {
    if seed_per_rev == 0.0 {
        return 0.0;
    }
    let acres_per_min = speed_mph * width_ft / MPH_FT_PER_ACRE_MIN;
    let lb_per_min = target_rate * acres_per_min;
    lb_per_min / seed_per_rev
}

/// Rate actually being applied given the measured shaft RPM.
pub fn calculate_application_rate(rpm: f32, seed_per_rev: f32, speed_mph: f32, width_ft: f32) -> f32 {
    if speed_mph <= STATIONARY_MPH || width_ft <= 0.0 {
        return 0.0;
    }
    (rpm * seed_per_rev * SQFT_PER_ACRE) / (speed_mph * width_ft * FT_PER_MILE / 60.0)
}
