//! Fixed-layout ESP-NOW packets exchanged with the screen.
//!
//! Every packet starts with a one-byte type discriminator:
//!
//! | Type | Value  | Direction           | Length |
//! |------|--------|---------------------|--------|
//! | Data | `0x01` | screen → controller | 40 (command) |
//! | Data | `0x01` | controller → screen | 42 (status)  |
//! | Pair request | `0xF0` | screen → controller | 1 |
//! | Pair ack     | `0xF1` | controller → screen | 1 |
//!
//! Multi-byte fields are little-endian, booleans are one byte (non-zero =
//! true), there is no padding.  Decoding checks the discriminator first
//! and then the length for that type; trailing bytes are ignored so a
//! newer screen can append fields.

use core::fmt;

use crate::error::FaultCode;

pub const PACKET_TYPE_DATA: u8 = 0x01;
pub const PACKET_TYPE_PAIR_REQUEST: u8 = 0xF0;
pub const PACKET_TYPE_PAIR_ACK: u8 = 0xF1;

/// Encoded length of a [`CommandPacket`], discriminator included.
pub const COMMAND_LEN: usize = 40;
/// Encoded length of a [`StatusPacket`], discriminator included.
pub const STATUS_LEN: usize = 42;
/// Firmware version field width (null-terminated).
pub const VERSION_LEN: usize = 12;

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    /// Zero-length frame.
    Empty,
    /// Unrecognised discriminator byte.
    UnknownType(u8),
    /// Frame shorter than the fixed layout for its type.
    Truncated { expected: usize, actual: usize },
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty packet"),
            Self::UnknownType(t) => write!(f, "unknown packet type 0x{t:02X}"),
            Self::Truncated { expected, actual } => {
                write!(f, "truncated packet ({actual} of {expected} bytes)")
            }
        }
    }
}

// ── Byte cursors ──────────────────────────────────────────────

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], PacketError> {
        let end = self.pos + N;
        let bytes = self.buf.get(self.pos..end).ok_or(PacketError::Truncated {
            expected: end,
            actual: self.buf.len(),
        })?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, PacketError> {
        Ok(self.take::<1>()?[0])
    }

    fn bool(&mut self) -> Result<bool, PacketError> {
        Ok(self.u8()? != 0)
    }

    fn f32(&mut self) -> Result<f32, PacketError> {
        Ok(f32::from_le_bytes(self.take()?))
    }

    fn i32(&mut self) -> Result<i32, PacketError> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    fn u32(&mut self) -> Result<u32, PacketError> {
        Ok(u32::from_le_bytes(self.take()?))
    }
}

struct Writer<const N: usize> {
    buf: [u8; N],
    pos: usize,
}

impl<const N: usize> Writer<N> {
    fn new() -> Self {
        Self { buf: [0; N], pos: 0 }
    }

    fn put(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        self
    }

    fn u8(&mut self, v: u8) -> &mut Self {
        self.put(&[v])
    }

    fn bool(&mut self, v: bool) -> &mut Self {
        self.u8(u8::from(v))
    }

    fn f32(&mut self, v: f32) -> &mut Self {
        self.put(&v.to_le_bytes())
    }

    fn i32(&mut self, v: i32) -> &mut Self {
        self.put(&v.to_le_bytes())
    }

    fn u32(&mut self, v: u32) -> &mut Self {
        self.put(&v.to_le_bytes())
    }

    fn finish(&self) -> [u8; N] {
        debug_assert_eq!(self.pos, N, "layout does not fill the packet");
        self.buf
    }
}

// ── Command (screen → controller) ─────────────────────────────

/// Configuration and one-shot commands from the screen.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CommandPacket {
    pub calibration_mode: bool,
    /// Target application rate (lb/acre)
    pub seeding_rate: f32,
    /// Weight caught over all calibration runs (lb)
    pub calibration_weight: f32,
    /// Recompute seed-per-rev from the accumulated revolutions
    pub calc_seed_per_rev: bool,
    pub motor_test: bool,
    pub motor_test_pwm: i32,
    pub speed_test: bool,
    pub speed_test_mph: f32,
    pub working_width: f32,
    pub calibration_runs: i32,
    /// Replacement seed-per-rev applied when `manual_seed_update` is set
    pub new_seed_per_rev: f32,
    pub manual_seed_update: bool,
    /// Operator acknowledged the current fault
    pub error_ack: bool,
    pub stall_protection: bool,
    pub stall_delay_ms: u32,
}

impl CommandPacket {
    fn decode_body(r: &mut Reader<'_>) -> Result<Self, PacketError> {
        Ok(Self {
            calibration_mode: r.bool()?,
            seeding_rate: r.f32()?,
            calibration_weight: r.f32()?,
            calc_seed_per_rev: r.bool()?,
            motor_test: r.bool()?,
            motor_test_pwm: r.i32()?,
            speed_test: r.bool()?,
            speed_test_mph: r.f32()?,
            working_width: r.f32()?,
            calibration_runs: r.i32()?,
            new_seed_per_rev: r.f32()?,
            manual_seed_update: r.bool()?,
            error_ack: r.bool()?,
            stall_protection: r.bool()?,
            stall_delay_ms: r.u32()?,
        })
    }

    pub fn encode(&self) -> [u8; COMMAND_LEN] {
        Writer::<COMMAND_LEN>::new()
            .u8(PACKET_TYPE_DATA)
            .bool(self.calibration_mode)
            .f32(self.seeding_rate)
            .f32(self.calibration_weight)
            .bool(self.calc_seed_per_rev)
            .bool(self.motor_test)
            .i32(self.motor_test_pwm)
            .bool(self.speed_test)
            .f32(self.speed_test_mph)
            .f32(self.working_width)
            .i32(self.calibration_runs)
            .f32(self.new_seed_per_rev)
            .bool(self.manual_seed_update)
            .bool(self.error_ack)
            .bool(self.stall_protection)
            .u32(self.stall_delay_ms)
            .finish()
    }
}

// ── Status (controller → screen) ──────────────────────────────

/// Live status sent to the screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusPacket {
    pub fix_valid: bool,
    pub num_satellites: u8,
    pub speed_mph: f32,
    /// Local hour (UTC offset already applied)
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub calibration_revs: f32,
    pub work_switch: bool,
    pub motor_active: bool,
    pub seed_per_rev: f32,
    pub shaft_rpm: f32,
    pub error_code: FaultCode,
    pub error_raised: bool,
    pub actual_rate: f32,
    /// Null-terminated firmware version
    pub version: [u8; VERSION_LEN],
}

impl StatusPacket {
    /// Copy `version` into the fixed field, truncating so at least one
    /// terminating null always remains.
    pub fn version_field(version: &str) -> [u8; VERSION_LEN] {
        let mut out = [0u8; VERSION_LEN];
        let n = version.len().min(VERSION_LEN - 1);
        out[..n].copy_from_slice(&version.as_bytes()[..n]);
        out
    }

    /// Version text up to the first null.
    pub fn version_str(&self) -> &str {
        let end = self.version.iter().position(|&b| b == 0).unwrap_or(VERSION_LEN);
        core::str::from_utf8(&self.version[..end]).unwrap_or("")
    }

    pub fn encode(&self) -> [u8; STATUS_LEN] {
        Writer::<STATUS_LEN>::new()
            .u8(PACKET_TYPE_DATA)
            .bool(self.fix_valid)
            .u8(self.num_satellites)
            .f32(self.speed_mph)
            .u8(self.hour)
            .u8(self.minute)
            .u8(self.second)
            .f32(self.calibration_revs)
            .bool(self.work_switch)
            .bool(self.motor_active)
            .f32(self.seed_per_rev)
            .f32(self.shaft_rpm)
            .u8(self.error_code.code())
            .bool(self.error_raised)
            .f32(self.actual_rate)
            .put(&self.version)
            .finish()
    }

    /// Decode a status frame (screen side, and for tests).
    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        let mut r = Reader::new(bytes);
        match r.u8().map_err(|_| PacketError::Empty)? {
            PACKET_TYPE_DATA => {}
            other => return Err(PacketError::UnknownType(other)),
        }
        check_len(bytes, STATUS_LEN)?;
        Ok(Self {
            fix_valid: r.bool()?,
            num_satellites: r.u8()?,
            speed_mph: r.f32()?,
            hour: r.u8()?,
            minute: r.u8()?,
            second: r.u8()?,
            calibration_revs: r.f32()?,
            work_switch: r.bool()?,
            motor_active: r.bool()?,
            seed_per_rev: r.f32()?,
            shaft_rpm: r.f32()?,
            error_code: FaultCode::from_code(r.u8()?),
            error_raised: r.bool()?,
            actual_rate: r.f32()?,
            version: r.take()?,
        })
    }
}

// ── Inbound ───────────────────────────────────────────────────

/// A packet received by the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Packet {
    Command(CommandPacket),
    PairRequest,
    PairAck,
}

impl Packet {
    /// Decode an inbound frame: discriminator first, then the
    /// length-checked body for that type.
    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        let mut r = Reader::new(bytes);
        let kind = r.u8().map_err(|_| PacketError::Empty)?;
        match kind {
            PACKET_TYPE_DATA => {
                check_len(bytes, COMMAND_LEN)?;
                Ok(Self::Command(CommandPacket::decode_body(&mut r)?))
            }
            PACKET_TYPE_PAIR_REQUEST => Ok(Self::PairRequest),
            PACKET_TYPE_PAIR_ACK => Ok(Self::PairAck),
            other => Err(PacketError::UnknownType(other)),
        }
    }
}

/// The one-byte pair acknowledgement.
pub const fn pair_ack() -> [u8; 1] {
    [PACKET_TYPE_PAIR_ACK]
}

/// The one-byte pair request (sent by the screen).
pub const fn pair_request() -> [u8; 1] {
    [PACKET_TYPE_PAIR_REQUEST]
}

fn check_len(bytes: &[u8], expected: usize) -> Result<(), PacketError> {
    if bytes.len() < expected {
        return Err(PacketError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}
