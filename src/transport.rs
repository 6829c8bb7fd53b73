//! Link-layer abstraction. The GATT layer never talks to a radio
//! directly; it receives requests through [`crate::gatt::Server`] entry
//! points and sends responses and notifications through these traits.

use std::fmt::Debug;

use crate::gatt::{DeviceId, RspStatus};
use crate::uuid::Uuid;

/// Transaction identifier correlating a response with the request that
/// produced it.
pub type RequestId = u32;

/// Transport-level failure. Attribute-level failures travel as
/// [`RspStatus`] instead.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("device {0} is not connected")]
    NotConnected(DeviceId),
    #[error("link failure: {0}")]
    Link(&'static str),
}

/// Common transport result type.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Peripheral-side transport: response and notification sink for a GATT
/// server.
pub trait Transport: Debug + Send + Sync {
    /// Sends the response for a remote read or write request. `value` is
    /// empty for write responses and failed reads.
    fn send_response(
        &self,
        dev: &DeviceId,
        req: RequestId,
        status: RspStatus,
        offset: usize,
        value: &[u8],
    ) -> Result<()>;

    /// Sends an unacknowledged value notification for the specified
    /// characteristic.
    fn notify(&self, dev: &DeviceId, char_uuid: Uuid, value: &[u8]) -> Result<()>;
}

/// Central-side transport: operations a GATT client issues against a
/// remote peripheral. Completion is reported asynchronously through
/// [`CentralEvent`]s.
pub trait CentralTransport: Debug + Send + Sync {
    /// Opens a GATT connection to the peripheral.
    fn connect_gatt(&self, dev: &DeviceId) -> Result<()>;

    /// Starts service discovery on a connected peripheral.
    fn discover_services(&self, dev: &DeviceId) -> Result<()>;

    /// Enables or disables notifications for a characteristic, including
    /// the Client Characteristic Configuration descriptor write.
    fn set_notify(&self, dev: &DeviceId, char_uuid: Uuid, enable: bool) -> Result<()>;

    /// Closes the GATT connection.
    fn disconnect(&self, dev: &DeviceId) -> Result<()>;
}

/// Link events delivered to a GATT client.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum CentralEvent {
    /// GATT connection established.
    Connected(DeviceId),
    /// GATT connection closed or lost.
    Disconnected(DeviceId),
    /// Service discovery finished with the listed service UUIDs.
    ServicesDiscovered(DeviceId, Vec<Uuid>),
    /// Unacknowledged value notification received.
    Notification {
        dev: DeviceId,
        char_uuid: Uuid,
        value: Vec<u8>,
    },
}
