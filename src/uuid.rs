//! UUID values ([Vol 3] Part B, Section 2.5.1).

use std::fmt::{Debug, Display, Formatter};
use std::num::NonZeroU128;

const SHIFT: u32 = u128::BITS - u32::BITS;
const BASE: u128 = 0x00000000_0000_1000_8000_00805F9B34FB;
const MASK_16: u128 = !((u16::MAX as u128) << SHIFT);

/// 128-bit UUID identifying a service, characteristic, or descriptor.
/// Compared by value. Assigned 16-bit Bluetooth SIG values are stored in
/// their Base UUID form, so `Uuid::sig16(0x180D)` equals the full
/// `0000180D-0000-1000-8000-00805F9B34FB`.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Uuid(NonZeroU128);

impl Uuid {
    /// Heart Rate service ([Assigned Numbers] Section 3.4.2).
    pub const HEART_RATE_SERVICE: Self = Self::sig16(0x180D);
    /// Heart Rate Measurement characteristic.
    pub const HEART_RATE_MEASUREMENT: Self = Self::sig16(0x2A37);
    /// Body Sensor Location characteristic.
    pub const BODY_SENSOR_LOCATION: Self = Self::sig16(0x2A38);
    /// Heart Rate Control Point characteristic.
    pub const HEART_RATE_CONTROL_POINT: Self = Self::sig16(0x2A39);
    /// Client Characteristic Configuration descriptor.
    pub const CLIENT_CHARACTERISTIC_CONFIGURATION: Self = Self::sig16(0x2902);

    /// UUID size in bytes.
    pub const BYTES: usize = std::mem::size_of::<Self>();

    /// Creates a UUID from an assigned 16-bit Bluetooth SIG value.
    ///
    /// # Panics
    ///
    /// Panics if `v` is zero.
    #[inline]
    #[must_use]
    pub const fn sig16(v: u16) -> Self {
        assert!(v != 0, "invalid 16-bit UUID");
        // SAFETY: The Base UUID is non-zero
        Self(unsafe { NonZeroU128::new_unchecked(BASE | (v as u128) << SHIFT) })
    }

    /// Creates a UUID from a `u128` or [`None`] if the value is zero.
    #[inline]
    #[must_use]
    pub const fn new(v: u128) -> Option<Self> {
        match NonZeroU128::new(v) {
            Some(nz) => Some(Self(nz)),
            None => None,
        }
    }

    /// Converts an assigned 16-bit Bluetooth SIG UUID to `u16`. Returns
    /// [`None`] if the UUID is not in the Base UUID range.
    #[inline]
    #[must_use]
    pub fn as_u16(self) -> Option<u16> {
        #[allow(clippy::cast_possible_truncation)]
        let v = (self.0.get() >> SHIFT) as u16;
        (self.0.get() & MASK_16 == BASE && v > 0).then_some(v)
    }

    /// Returns the UUID as a little-endian byte array.
    #[inline]
    #[must_use]
    pub const fn to_bytes(self) -> [u8; Self::BYTES] {
        self.0.get().to_le_bytes()
    }
}

impl From<Uuid> for u128 {
    #[inline(always)]
    fn from(u: Uuid) -> Self {
        u.0.get()
    }
}

impl Debug for Uuid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(v) = self.as_u16() {
            return write!(f, "{v:#06X}");
        }
        let v = self.0.get();
        #[allow(clippy::cast_possible_truncation)]
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:04X}-{:012X}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & ((1 << 48) - 1)
        )
    }
}

impl Display for Uuid {
    #[inline(always)]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sig16() {
        let u = Uuid::HEART_RATE_SERVICE;
        assert_eq!(u.as_u16(), Some(0x180D));
        assert_eq!(
            u128::from(u),
            0x0000180D_0000_1000_8000_00805F9B34FB_u128
        );
        assert_eq!(format!("{u}"), "0x180D");
    }

    #[test]
    fn non_sig() {
        let u = Uuid::new(0x12345678_9ABC_DEF0_1234_56789ABCDEF0).unwrap();
        assert_eq!(u.as_u16(), None);
        assert_eq!(format!("{u}"), "12345678-9ABC-DEF0-1234-56789ABCDEF0");
    }

    #[test]
    fn bytes() {
        let b = Uuid::HEART_RATE_MEASUREMENT.to_bytes();
        assert_eq!(&b[12..], &[0x37, 0x2A, 0x00, 0x00]);
    }
}
