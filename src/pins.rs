//! GPIO / peripheral pin assignments for the seedmeter controller board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Metering motor driver
// ---------------------------------------------------------------------------

/// LEDC PWM output for motor speed.
pub const MOTOR_PWM_GPIO: i32 = 16;
/// Digital output: HIGH = forward.  The drive only ever runs forward.
pub const MOTOR_DIR_GPIO: i32 = 17;
/// Motor PWM frequency (8-bit resolution).
pub const MOTOR_PWM_FREQ_HZ: u32 = 5_000;

// ---------------------------------------------------------------------------
// Shaft encoder (PCNT unit 0)
// ---------------------------------------------------------------------------

/// Encoder channel A: counted on rising edges.
pub const ENCODER_A_GPIO: i32 = 3;
/// Encoder channel B: wired but unused by the single-channel counter.
pub const ENCODER_B_GPIO: i32 = 8;

// ---------------------------------------------------------------------------
// Operator inputs (active-low, internal pull-ups)
// ---------------------------------------------------------------------------

/// Implement work switch: LOW = lowered / working.
pub const WORK_SWITCH_GPIO: i32 = 18;
/// Calibration "prime" button: LOW = held.
pub const CAL_BUTTON_GPIO: i32 = 6;
/// BOOT button doubles as the pairing button.
pub const PAIR_BUTTON_GPIO: i32 = 0;

// ---------------------------------------------------------------------------
// Indicators
// ---------------------------------------------------------------------------

pub const POWER_LED_GPIO: i32 = 4;
pub const CAL_LED_GPIO: i32 = 5;

// ---------------------------------------------------------------------------
// GPS UART (driven by the external NMEA reader)
// ---------------------------------------------------------------------------

pub const GPS_RX_GPIO: i32 = 7;
pub const GPS_TX_GPIO: i32 = 15;
