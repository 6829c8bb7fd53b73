//! Companion GATT central: connects to a Heart Rate peripheral,
//! subscribes to measurement notifications, and streams decoded
//! measurements over a watch channel.

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::gatt::{decode_measurement, DeviceId, Measurement};
use crate::transport::{self, CentralEvent, CentralTransport};
use crate::uuid::Uuid;

/// Client connection phase.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CentralState {
    /// Not connected.
    #[default]
    Idle,
    /// Connection requested, waiting for the link.
    Connecting,
    /// Connected, waiting for service discovery.
    Discovering,
    /// Subscribed to Heart Rate Measurement notifications.
    Subscribed,
}

/// Heart Rate client driving one peripheral. Transport events feed
/// [`HeartRateCentral::handle_event`]; decoded measurements come out of
/// the receiver returned by [`HeartRateCentral::measurements`], where
/// [`None`] means not currently receiving.
#[derive(Debug)]
pub struct HeartRateCentral<T> {
    transport: T,
    dev: DeviceId,
    state: Mutex<CentralState>,
    tx: watch::Sender<Option<Measurement>>,
}

impl<T: CentralTransport> HeartRateCentral<T> {
    /// Creates an idle client for the specified peripheral.
    #[must_use]
    pub fn new(transport: T, dev: DeviceId) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            transport,
            dev,
            state: Mutex::new(CentralState::Idle),
            tx,
        }
    }

    /// Returns the current connection phase.
    #[must_use]
    pub fn state(&self) -> CentralState {
        *self.state.lock()
    }

    /// Returns a receiver for decoded measurements.
    #[must_use]
    pub fn measurements(&self) -> watch::Receiver<Option<Measurement>> {
        self.tx.subscribe()
    }

    /// Requests a GATT connection. A no-op unless idle.
    pub fn connect(&self) -> transport::Result<()> {
        let mut state = self.state.lock();
        if *state != CentralState::Idle {
            return Ok(());
        }
        info!("Connecting to {}", self.dev);
        self.transport.connect_gatt(&self.dev)?;
        *state = CentralState::Connecting;
        Ok(())
    }

    /// Disables notifications, closes the connection, and clears the
    /// measurement stream.
    pub fn disconnect(&self) -> transport::Result<()> {
        let mut state = self.state.lock();
        if *state == CentralState::Idle {
            return Ok(());
        }
        info!("Disconnecting from {}", self.dev);
        if *state == CentralState::Subscribed {
            (self.transport).set_notify(&self.dev, Uuid::HEART_RATE_MEASUREMENT, false)?;
        }
        self.transport.disconnect(&self.dev)?;
        *state = CentralState::Idle;
        self.tx.send_replace(None);
        Ok(())
    }

    /// Advances the state machine on a transport event. Events for other
    /// devices are ignored.
    pub fn handle_event(&self, event: &CentralEvent) -> transport::Result<()> {
        match *event {
            CentralEvent::Connected(ref dev) if *dev == self.dev => self.on_connected(),
            CentralEvent::Disconnected(ref dev) if *dev == self.dev => {
                info!("Disconnected from {dev}");
                *self.state.lock() = CentralState::Idle;
                self.tx.send_replace(None);
                Ok(())
            }
            CentralEvent::ServicesDiscovered(ref dev, ref services) if *dev == self.dev => {
                self.on_services_discovered(services)
            }
            CentralEvent::Notification {
                ref dev,
                char_uuid,
                ref value,
            } if *dev == self.dev && char_uuid == Uuid::HEART_RATE_MEASUREMENT => {
                // Malformed notifications are dropped; the stream keeps
                // its last good measurement.
                match decode_measurement(value) {
                    Ok(m) => {
                        debug!("Measurement from {dev}: {} bpm", m.heart_rate);
                        self.tx.send_replace(Some(m));
                    }
                    Err(e) => warn!("Dropping malformed notification from {dev}: {e}"),
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// A new link always restarts discovery, including after a reconnect.
    fn on_connected(&self) -> transport::Result<()> {
        info!("Connected to {}, discovering services", self.dev);
        self.transport.discover_services(&self.dev)?;
        *self.state.lock() = CentralState::Discovering;
        Ok(())
    }

    fn on_services_discovered(&self, services: &[Uuid]) -> transport::Result<()> {
        if !services.contains(&Uuid::HEART_RATE_SERVICE) {
            warn!("{} does not host the Heart Rate service", self.dev);
            return self.disconnect();
        }
        (self.transport).set_notify(&self.dev, Uuid::HEART_RATE_MEASUREMENT, true)?;
        *self.state.lock() = CentralState::Subscribed;
        Ok(())
    }
}
