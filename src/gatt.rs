//! Generic Attribute Profile layer ([Vol 3] Part G) for the Heart Rate
//! service: value codec, attribute model, request routing, subscription
//! tracking, and notification scheduling.

pub use {attrs::*, codec::*, consts::*, notify::*, server::*, subscribers::*};

use crate::uuid::Uuid;

pub mod service;

mod attrs;
mod codec;
mod consts;
mod notify;
mod server;
mod subscribers;

/// Error type returned by the GATT layer.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("{kind} {uuid} is not hosted")]
    NotFound { kind: &'static str, uuid: Uuid },
    #[error("{access} access to {uuid} denied")]
    PermissionDenied { uuid: Uuid, access: Access },
    #[error("offset {offset} is past the end of {uuid}")]
    InvalidOffset { uuid: Uuid, offset: usize },
    #[error("operation not supported")]
    NotSupported,
}

impl Error {
    /// Returns the protocol status code reported to the remote device.
    #[must_use]
    pub fn status(&self) -> ErrorCode {
        match *self {
            Self::Range(_) => ErrorCode::OutOfRange,
            Self::Codec(e) => e.status(),
            Self::NotFound { .. } | Self::NotSupported => ErrorCode::RequestNotSupported,
            Self::PermissionDenied { access, .. } => {
                if access.contains(Access::WRITE) {
                    ErrorCode::WriteNotPermitted
                } else {
                    ErrorCode::ReadNotPermitted
                }
            }
            Self::InvalidOffset { .. } => ErrorCode::InvalidOffset,
        }
    }
}

/// Common GATT result type.
pub type Result<T> = std::result::Result<T, Error>;
