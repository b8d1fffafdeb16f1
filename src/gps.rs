//! GPS snapshot and the UART reader task that keeps it fresh.
//!
//! ```text
//!  GpsSource (UART bytes) ──▶ NmeaDecoder ──▶ GpsFeed ──▶ SharedState::publish_gps
//!                             RMC: time, status, speed
//!                             GGA: fix quality, satellites
//! ```
//!
//! The control loop only ever reads the latest snapshot.  When the
//! receiver goes quiet for [`GPS_STALE_MS`] the feed publishes a lost fix
//! with zero speed so the drive stops metering on an old speed.

use std::sync::Arc;

use log::{info, warn};

use crate::app::ports::GpsSource;
use crate::shared::SharedState;

/// Silence after which the last fix is withdrawn.
pub const GPS_STALE_MS: u64 = 2_500;

const KNOTS_TO_MPH: f32 = 1.150_78;
/// Below this the receiver's speed is mostly noise.
const MIN_SPEED_KNOTS: f32 = 0.5;
/// NMEA caps sentences at 82 characters.
const LINE_CAP: usize = 96;

/// Latest fix.  Time fields are UTC.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpsReading {
    pub fix_valid: bool,
    pub num_satellites: u8,
    pub speed_mph: f32,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Shift a UTC hour by `offset_hours`, wrapping into `0..24`.
pub fn local_hour(utc_hour: u8, offset_hours: i8) -> u8 {
    (i16::from(utc_hour) + i16::from(offset_hours)).rem_euclid(24) as u8
}

fn knots_to_mph(knots: f32) -> f32 {
    if knots > MIN_SPEED_KNOTS { knots * KNOTS_TO_MPH } else { 0.0 }
}

// ── NmeaDecoder ───────────────────────────────────────────────

/// Line framer plus RMC/GGA field extraction.  Other sentences and
/// anything failing the checksum are skipped.
#[derive(Debug, Default)]
pub struct NmeaDecoder {
    line: heapless::String<LINE_CAP>,
    discard: bool,
    reading: GpsReading,
}

impl NmeaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw UART bytes.  Returns the updated reading when at least one
    /// RMC or GGA sentence completed.
    pub fn push(&mut self, bytes: &[u8]) -> Option<GpsReading> {
        let mut updated = false;
        for &b in bytes {
            match b {
                b'$' => {
                    self.line.clear();
                    self.discard = false;
                    let _ = self.line.push('$');
                }
                b'\r' => {}
                b'\n' => {
                    if !self.discard && !self.line.is_empty() {
                        updated |= decode_sentence(self.line.as_str(), &mut self.reading);
                    }
                    self.line.clear();
                }
                _ if !b.is_ascii() => self.discard = true,
                _ => {
                    if self.line.push(char::from(b)).is_err() {
                        self.discard = true;
                    }
                }
            }
        }
        updated.then_some(self.reading)
    }

    /// Forget the current fix (speed and satellites), keeping the clock.
    pub fn invalidate(&mut self) {
        self.reading.fix_valid = false;
        self.reading.num_satellites = 0;
        self.reading.speed_mph = 0.0;
    }
}

/// `$<body>*<hex>` with a matching XOR checksum; returns `<body>`.
fn checked_body(line: &str) -> Option<&str> {
    let (body, cs) = line.strip_prefix('$')?.split_once('*')?;
    let expected = u8::from_str_radix(cs.get(..2)?, 16).ok()?;
    let actual = body.bytes().fold(0u8, |acc, b| acc ^ b);
    (actual == expected).then_some(body)
}

fn decode_sentence(line: &str, r: &mut GpsReading) -> bool {
    let Some(body) = checked_body(line) else {
        return false;
    };
    let mut fields = body.split(',');
    let talker = fields.next().unwrap_or("");
    match talker.get(2..) {
        Some("RMC") => decode_rmc(fields, r),
        Some("GGA") => decode_gga(fields, r),
        _ => false,
    }
}

/// `hhmmss[.ss]`
fn parse_time(field: &str) -> Option<(u8, u8, u8)> {
    let h: u8 = field.get(0..2)?.parse().ok()?;
    let m: u8 = field.get(2..4)?.parse().ok()?;
    let s: u8 = field.get(4..6)?.parse().ok()?;
    (h < 24 && m < 60 && s < 61).then_some((h, m, s))
}

// $xxRMC,time,status,lat,NS,lon,EW,speed_kn,course,date,...
fn decode_rmc<'a>(mut f: impl Iterator<Item = &'a str>, r: &mut GpsReading) -> bool {
    let time = f.next().unwrap_or("");
    let status = f.next().unwrap_or("");
    let speed = f.nth(4).unwrap_or("");

    if let Some((h, m, s)) = parse_time(time) {
        r.hour = h;
        r.minute = m;
        r.second = s;
    }
    r.fix_valid = status == "A";
    r.speed_mph = if r.fix_valid {
        knots_to_mph(speed.parse().unwrap_or(0.0))
    } else {
        0.0
    };
    true
}

// $xxGGA,time,lat,NS,lon,EW,quality,sats,...
fn decode_gga<'a>(mut f: impl Iterator<Item = &'a str>, r: &mut GpsReading) -> bool {
    let quality: u8 = f.nth(5).and_then(|q| q.parse().ok()).unwrap_or(0);
    r.num_satellites = f.next().and_then(|n| n.parse().ok()).unwrap_or(0);
    if quality == 0 {
        r.fix_valid = false;
        r.speed_mph = 0.0;
    } else {
        r.fix_valid = true;
    }
    true
}

// ── GpsFeed ───────────────────────────────────────────────────

/// Body of the GPS task: drain the source, publish every decoded fix,
/// withdraw the fix when the receiver goes quiet.
pub struct GpsFeed<S: GpsSource> {
    source: S,
    decoder: NmeaDecoder,
    shared: Arc<SharedState>,
    last_sentence_ms: u64,
    stale: bool,
    buf: [u8; 256],
}

impl<S: GpsSource> GpsFeed<S> {
    pub fn new(source: S, shared: Arc<SharedState>, now_ms: u64) -> Self {
        Self {
            source,
            decoder: NmeaDecoder::new(),
            shared,
            last_sentence_ms: now_ms,
            stale: false,
            buf: [0; 256],
        }
    }

    /// One read from the source.  Returns `true` when a reading was
    /// published.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        let n = self.source.read(&mut self.buf).min(self.buf.len());
        if let Some(reading) = self.decoder.push(&self.buf[..n]) {
            self.shared.publish_gps(reading);
            self.last_sentence_ms = now_ms;
            if self.stale {
                info!("GPS: receiving again");
                self.stale = false;
            }
            return true;
        }

        if !self.stale && now_ms.saturating_sub(self.last_sentence_ms) >= GPS_STALE_MS {
            self.stale = true;
            self.decoder.invalidate();
            warn!("GPS: no sentence for {} ms, fix withdrawn", GPS_STALE_MS);
            self.shared.publish_gps(GpsReading {
                fix_valid: false,
                num_satellites: 0,
                speed_mph: 0.0,
                ..self.shared.gps()
            });
            return true;
        }
        false
    }
}
