//! GATT Heart Rate Service peripheral and companion central.
//!
//! Implements the data layer of the Bluetooth SIG Heart Rate Service
//! ([HRS]): the measurement codec, the attribute model, server-side request
//! routing with notification subscriptions, periodic measurement fan-out,
//! and a central that subscribes to a remote Heart Rate server. The radio
//! stack below is a black box behind the [`transport`] traits.
//!
//! [HRS]: https://www.bluetooth.com/specifications/specs/heart-rate-service-1-0/

pub mod central;
pub mod gatt;
pub mod sensor;
pub mod transport;
pub mod uuid;

mod util;
