use bitflags::bitflags;

use crate::util::impl_display_via_debug;

bitflags! {
    /// Characteristic properties ([Vol 3] Part G, Section 3.3.1.1).
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct Prop: u8 {
        /// Permits reads of the Characteristic Value.
        const READ = 0x02;
        /// Permits writes of the Characteristic Value without response.
        const WRITE_WITHOUT_RESPONSE = 0x04;
        /// Permits writes of the Characteristic Value with response.
        const WRITE = 0x08;
        /// Permits notifications of a Characteristic Value without
        /// acknowledgment. If set, the Client Characteristic Configuration
        /// descriptor shall exist.
        const NOTIFY = 0x10;
    }
}

bitflags! {
    /// Attribute access permissions ([Vol 3] Part F, Section 3.2.5).
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct Access: u8 {
        /// Read access.
        const READ = 1 << 0;
        /// Write access.
        const WRITE = 1 << 1;
    }
}

impl_display_via_debug! { Prop, Access }

impl Access {
    /// No access.
    pub const NONE: Self = Self::empty();
    /// Read/write access.
    pub const READ_WRITE: Self = Self::READ.union(Self::WRITE);

    /// Tests whether an access request should be allowed. The permission
    /// set must be a superset of the request.
    pub(crate) fn test(self, req: Self) -> std::result::Result<(), ErrorCode> {
        if req.is_empty() {
            return Err(ErrorCode::RequestNotSupported);
        }
        let fail = req.difference(self);
        if fail.contains(Self::READ) {
            Err(ErrorCode::ReadNotPermitted)
        } else if fail.contains(Self::WRITE) {
            Err(ErrorCode::WriteNotPermitted)
        } else {
            Ok(())
        }
    }
}

/// ATT protocol status codes reported to the remote device
/// ([Vol 3] Part F, Section 3.4.1.1).
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[non_exhaustive]
#[repr(u8)]
pub enum ErrorCode {
    /// The attribute handle given was not valid on this server.
    InvalidHandle = 0x01,
    /// The attribute cannot be read.
    ReadNotPermitted = 0x02,
    /// The attribute cannot be written.
    WriteNotPermitted = 0x03,
    /// ATT server does not support the request received from the client.
    RequestNotSupported = 0x06,
    /// Offset specified was past the end of the attribute.
    InvalidOffset = 0x07,
    /// The attribute value length is invalid for the operation.
    InvalidAttributeValueLength = 0x0D,
    /// The request encountered an unlikely error and could not be completed.
    UnlikelyError = 0x0E,
    /// The attribute parameter value was not allowed.
    ValueNotAllowed = 0x13,
    /// Attribute value is out of range.
    OutOfRange = 0xFF,
}

impl_display_via_debug! { ErrorCode }

/// Response status reported back through the transport. `Ok` maps to the
/// GATT success status (`0x00`) on the wire.
pub type RspStatus = std::result::Result<(), ErrorCode>;

/// Client Characteristic Configuration value enabling notifications
/// ([Vol 3] Part G, Section 3.3.3.3), little-endian.
pub const ENABLE_NOTIFICATION: [u8; 2] = [0x01, 0x00];

/// Client Characteristic Configuration value disabling notifications.
pub const DISABLE_NOTIFICATION: [u8; 2] = [0x00, 0x00];

/// Body Sensor Location characteristic values. 7..=255 are reserved.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[non_exhaustive]
#[repr(u8)]
pub enum BodySensorLocation {
    Other = 0,
    Chest = 1,
    Wrist = 2,
    Finger = 3,
    Hand = 4,
    EarLobe = 5,
    Foot = 6,
}

impl_display_via_debug! { BodySensorLocation }

/// Heart Rate Control Point commands. Only Reset Energy Expended is
/// defined by the service.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[non_exhaustive]
#[repr(u8)]
pub enum ControlPoint {
    ResetEnergyExpended = 0x01,
}

impl_display_via_debug! { ControlPoint }
