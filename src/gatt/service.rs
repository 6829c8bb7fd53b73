//! GATT service implementations.

pub use hrs::*;

mod hrs;
