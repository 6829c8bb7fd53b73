use bitflags::bitflags;
use structbuf::{Pack, StructBuf, Unpacker};

use super::*;

bitflags! {
    /// Heart Rate Measurement flags byte. Sensor Contact and RR-Interval
    /// bits are not supported and always zero.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[repr(transparent)]
    struct Flags: u8 {
        /// Heart rate value field is UInt16 rather than UInt8.
        const UINT16_FORMAT = 1 << 0;
        /// Energy Expended field is present.
        const ENERGY_EXPENDED = 1 << 3;
    }
}

/// Semantic value outside its protocol-declared integer bounds.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("value {value} is out of bounds (expected 0..={max})")]
pub struct RangeError {
    pub value: i64,
    pub max: u16,
}

/// Malformed or truncated value buffer, or a logically absent optional
/// field requested.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum CodecError {
    #[error("value buffer too short")]
    BufferTooShort,
    #[error("energy expended field is not present")]
    MissingEnergyExpended,
    #[error("unknown control point command {0:#04X}")]
    UnknownCommand(u8),
    #[error("unexpected value length {0}")]
    InvalidLength(usize),
}

impl CodecError {
    /// Returns the protocol status code reported to the remote device.
    #[must_use]
    pub const fn status(self) -> ErrorCode {
        match self {
            Self::BufferTooShort | Self::InvalidLength(_) => {
                ErrorCode::InvalidAttributeValueLength
            }
            Self::MissingEnergyExpended => ErrorCode::RequestNotSupported,
            Self::UnknownCommand(_) => ErrorCode::ValueNotAllowed,
        }
    }
}

/// Fails if `v` is outside the UInt8 range.
#[inline]
pub fn assert_u8_range(v: i64) -> std::result::Result<(), RangeError> {
    assert_range(v, u8::MAX.into())
}

/// Fails if `v` is outside the UInt16 range.
#[inline]
pub fn assert_u16_range(v: i64) -> std::result::Result<(), RangeError> {
    assert_range(v, u16::MAX)
}

#[inline]
fn assert_range(v: i64, max: u16) -> std::result::Result<(), RangeError> {
    if 0 <= v && v <= i64::from(max) {
        Ok(())
    } else {
        Err(RangeError { value: v, max })
    }
}

/// Logical view over the Heart Rate Measurement characteristic value
/// ([GSS] Section 3.113).
///
/// The encoded layout is `[flags, HR(1 or 2 bytes), EE(2 bytes)?]`, all
/// little-endian. The flags byte determines the heart rate width (bit 0)
/// and Energy Expended presence (bit 3), so the encoded length is 2, 3, 4,
/// or 5 bytes and is always computed, never stored.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[must_use]
pub struct Measurement {
    /// Heart rate in beats per minute.
    pub heart_rate: u16,
    /// Energy expended in kilojoules since the last reset.
    pub energy_expended: Option<u16>,
}

impl Measurement {
    /// Creates a measurement carrying only the heart rate.
    #[inline(always)]
    pub const fn new(heart_rate: u16) -> Self {
        Self {
            heart_rate,
            energy_expended: None,
        }
    }

    /// Validates raw sensor values and returns the logical measurement.
    /// Either value outside the UInt16 range fails the whole conversion.
    pub fn checked(
        heart_rate: u32,
        energy_expended: Option<u32>,
    ) -> std::result::Result<Self, RangeError> {
        assert_u16_range(heart_rate.into())?;
        if let Some(ee) = energy_expended {
            assert_u16_range(ee.into())?;
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self {
            heart_rate: heart_rate as u16,
            energy_expended: energy_expended.map(|ee| ee as u16),
        })
    }

    /// Encodes the measurement value. A heart rate of 0..=255 uses the
    /// UInt8 field width, 256..=65535 the UInt16 width, with no hysteresis
    /// based on prior encodes.
    pub fn pack(&self) -> StructBuf {
        let mut flags = Flags::empty();
        let wide = self.heart_rate > u16::from(u8::MAX);
        flags.set(Flags::UINT16_FORMAT, wide);
        flags.set(Flags::ENERGY_EXPENDED, self.energy_expended.is_some());
        let mut b = StructBuf::new(5);
        let p = &mut b.append();
        p.u8(flags.bits());
        if wide {
            p.u16(self.heart_rate);
        } else {
            #[allow(clippy::cast_possible_truncation)]
            p.u8(self.heart_rate as u8);
        }
        if let Some(ee) = self.energy_expended {
            p.u16(ee);
        }
        b
    }

    /// Returns the energy expended field, failing if the encoded flags
    /// declared it absent.
    #[inline]
    pub fn require_energy_expended(&self) -> std::result::Result<u16, CodecError> {
        self.energy_expended.ok_or(CodecError::MissingEnergyExpended)
    }
}

/// Validates and encodes a measurement in one step. No partial value is
/// produced on failure.
#[inline]
pub fn encode_measurement(
    heart_rate: u32,
    energy_expended: Option<u32>,
) -> std::result::Result<StructBuf, RangeError> {
    Measurement::checked(heart_rate, energy_expended).map(|m| m.pack())
}

/// Decodes a Heart Rate Measurement value. The flags byte is read
/// literally; the Energy Expended offset follows the heart rate width
/// (offset 2 for UInt8, 3 for UInt16).
pub fn decode_measurement(v: &[u8]) -> std::result::Result<Measurement, CodecError> {
    let mut p = Unpacker::new(v);
    let flags = Flags::from_bits_truncate(p.u8());
    let heart_rate = if flags.contains(Flags::UINT16_FORMAT) {
        p.u16()
    } else {
        p.u8().into()
    };
    let energy_expended = flags.contains(Flags::ENERGY_EXPENDED).then(|| p.u16());
    if !p.is_ok() {
        return Err(CodecError::BufferTooShort);
    }
    Ok(Measurement {
        heart_rate,
        energy_expended,
    })
}

/// Decodes a Heart Rate Control Point write payload: a single UInt8
/// command code.
pub fn decode_control_point(v: &[u8]) -> std::result::Result<ControlPoint, CodecError> {
    match *v {
        [] => Err(CodecError::BufferTooShort),
        [cmd] => ControlPoint::try_from(cmd).map_err(|_| CodecError::UnknownCommand(cmd)),
        _ => Err(CodecError::InvalidLength(v.len())),
    }
}

/// Decodes a Body Sensor Location value.
pub fn decode_body_sensor_location(
    v: &[u8],
) -> std::result::Result<BodySensorLocation, CodecError> {
    match *v {
        [] => Err(CodecError::BufferTooShort),
        [loc] => {
            BodySensorLocation::try_from(loc).map_err(|_| CodecError::UnknownCommand(loc))
        }
        _ => Err(CodecError::InvalidLength(v.len())),
    }
}
