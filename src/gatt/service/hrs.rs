//! Heart Rate service ([HRS] Section 3).

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::gatt::*;
use crate::sensor::HeartRateSource;
use crate::transport::Transport;
use crate::uuid::Uuid;

/// Builds the Heart Rate service attribute tree: a notify-only Heart Rate
/// Measurement with its Client Characteristic Configuration descriptor, a
/// read-only Body Sensor Location, and a write-only Heart Rate Control
/// Point.
#[must_use]
pub fn heart_rate_service() -> Service {
    let measurement = Characteristic::new(
        Uuid::HEART_RATE_MEASUREMENT,
        Prop::NOTIFY,
        Access::NONE,
        [Descriptor::new(
            Uuid::CLIENT_CHARACTERISTIC_CONFIGURATION,
            Access::READ_WRITE,
        )],
    );
    let location = Characteristic::new(
        Uuid::BODY_SENSOR_LOCATION,
        Prop::READ,
        Access::READ,
        [],
    );
    location.set_value(&[u8::from(BodySensorLocation::Other)]);
    let control_point = Characteristic::new(
        Uuid::HEART_RATE_CONTROL_POINT,
        Prop::WRITE,
        Access::WRITE,
        [],
    );
    Service::new(
        Uuid::HEART_RATE_SERVICE,
        [measurement, location, control_point],
    )
}

/// Heart Rate service handler. Owns the subscription registry, the energy
/// expended accumulator, and the notification schedule; publishes one
/// measurement per tick to every subscribed central.
#[derive(Debug)]
pub struct HeartRateHandler {
    service: Service,
    subscribers: Subscribers,
    source: Arc<dyn HeartRateSource>,
    notifier: Notifier,
    energy: Mutex<Option<u16>>,
    transport: Mutex<Option<Arc<dyn Transport>>>,
}

impl HeartRateHandler {
    /// Creates the handler. Notifications start when the owning server
    /// activates it.
    #[must_use]
    pub fn new(
        source: Arc<dyn HeartRateSource>,
        location: BodySensorLocation,
        cfg: NotifyConfig,
    ) -> Arc<Self> {
        let service = heart_rate_service();
        if let Ok(c) = service.characteristic(Uuid::BODY_SENSOR_LOCATION) {
            c.set_value(&[u8::from(location)]);
        }
        Arc::new(Self {
            service,
            subscribers: Subscribers::new(),
            source,
            notifier: Notifier::new(cfg),
            energy: Mutex::new(None),
            transport: Mutex::new(None),
        })
    }

    /// Returns the subscription registry.
    #[inline]
    #[must_use]
    pub fn subscribers(&self) -> &Subscribers {
        &self.subscribers
    }

    /// Returns the accumulated energy expended in kilojoules, or [`None`]
    /// if the sensor does not track it.
    #[must_use]
    pub fn energy_expended(&self) -> Option<u16> {
        *self.energy.lock()
    }

    /// Publishes the energy expended accumulator value.
    pub fn set_energy_expended(&self, kilojoules: Option<u16>) {
        *self.energy.lock() = kilojoules;
    }

    /// Validates and stores a new measurement value. On a range failure
    /// the stored value is left untouched.
    pub fn set_measurement(
        &self,
        heart_rate: u32,
        energy_expended: Option<u32>,
    ) -> std::result::Result<(), RangeError> {
        let buf = encode_measurement(heart_rate, energy_expended)?;
        self.measurement().set_value(buf.as_ref());
        Ok(())
    }

    /// Returns the stored measurement value.
    #[must_use]
    pub fn measurement_value(&self) -> Vec<u8> {
        self.measurement().value()
    }

    fn measurement(&self) -> &Characteristic {
        // Hosted unconditionally by `heart_rate_service`
        match self.service.characteristic(Uuid::HEART_RATE_MEASUREMENT) {
            Ok(c) => c,
            Err(_) => unreachable!(),
        }
    }

    /// One notification cycle: sample, encode, store, fan out. A sensor
    /// without a reading or an out-of-range reading skips the cycle
    /// without touching the stored value or the schedule.
    fn tick(&self) {
        let Some(transport) = self.transport.lock().clone() else {
            return;
        };
        let bpm = match self.source.current_bpm() {
            Ok(bpm) => bpm,
            Err(e) => {
                debug!("{e}, skipping notification");
                return;
            }
        };
        let buf = match encode_measurement(bpm, None) {
            Ok(buf) => buf,
            Err(e) => {
                warn!("Dropping sensor reading: {e}");
                return;
            }
        };
        self.measurement().set_value(buf.as_ref());
        for dev in &self.subscribers.snapshot() {
            if let Err(e) = transport.notify(dev, Uuid::HEART_RATE_MEASUREMENT, buf.as_ref()) {
                warn!("Notification to {dev} failed: {e}");
            }
        }
    }
}

impl ServiceHandler for HeartRateHandler {
    fn service(&self) -> &Service {
        &self.service
    }

    fn activate(self: Arc<Self>, transport: Arc<dyn Transport>) {
        *self.transport.lock() = Some(transport);
        let this = Arc::clone(&self);
        self.notifier.start(move || this.tick());
    }

    fn deactivate(&self) -> Option<JoinHandle<()>> {
        let task = self.notifier.halt();
        *self.transport.lock() = None;
        self.subscribers.clear();
        task
    }

    fn read_characteristic(&self, _dev: &DeviceId, uuid: Uuid, offset: usize) -> Result<Vec<u8>> {
        self.service.characteristic(uuid)?.read(offset)
    }

    fn write_characteristic(&self, dev: &DeviceId, uuid: Uuid, value: &[u8]) -> Result<()> {
        let c = self.service.characteristic(uuid)?;
        if uuid != Uuid::HEART_RATE_CONTROL_POINT {
            return c.write(value);
        }
        let cmd = decode_control_point(value)?;
        c.write(value)?;
        match cmd {
            ControlPoint::ResetEnergyExpended => {
                info!("Energy expended reset by {dev}");
                *self.energy.lock() = Some(0);
            }
        }
        Ok(())
    }

    fn read_descriptor(
        &self,
        dev: &DeviceId,
        char_uuid: Uuid,
        desc_uuid: Uuid,
        offset: usize,
    ) -> Result<Vec<u8>> {
        let d = self.service.descriptor(char_uuid, desc_uuid)?;
        if d.access().test(Access::READ).is_err() {
            return Err(Error::PermissionDenied {
                uuid: desc_uuid,
                access: Access::READ,
            });
        }
        // The configuration value is per-device state, not a stored
        // attribute value.
        let v = if self.subscribers.contains(dev) {
            ENABLE_NOTIFICATION
        } else {
            DISABLE_NOTIFICATION
        };
        (v.get(offset..)).map(<[u8]>::to_vec).ok_or(Error::InvalidOffset {
            uuid: desc_uuid,
            offset,
        })
    }

    fn write_descriptor(
        &self,
        dev: &DeviceId,
        char_uuid: Uuid,
        desc_uuid: Uuid,
        value: &[u8],
    ) -> Result<()> {
        let d = self.service.descriptor(char_uuid, desc_uuid)?;
        if d.access().test(Access::WRITE).is_err() {
            return Err(Error::PermissionDenied {
                uuid: desc_uuid,
                access: Access::WRITE,
            });
        }
        if value == ENABLE_NOTIFICATION {
            self.subscribers.add(dev.clone());
        } else if value == DISABLE_NOTIFICATION {
            self.subscribers.remove(dev);
        }
        // Any other value is ignored per the permissive client contract.
        Ok(())
    }

    fn connection_changed(&self, dev: &DeviceId, connected: bool) {
        if !connected {
            self.subscribers.remove(dev);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use matches::assert_matches;

    use crate::sensor::LatestBpm;
    use crate::transport::fake::FakeTransport;

    use super::*;

    fn handler() -> Arc<HeartRateHandler> {
        HeartRateHandler::new(
            Arc::new(LatestBpm::new()),
            BodySensorLocation::Wrist,
            NotifyConfig::default(),
        )
    }

    #[test]
    fn subscribe_flow() {
        let h = handler();
        let dev = DeviceId::from("AA:BB");
        let (hrm, cccd) = (
            Uuid::HEART_RATE_MEASUREMENT,
            Uuid::CLIENT_CHARACTERISTIC_CONFIGURATION,
        );
        assert_eq!(
            h.read_descriptor(&dev, hrm, cccd, 0).unwrap(),
            DISABLE_NOTIFICATION
        );
        h.write_descriptor(&dev, hrm, cccd, &ENABLE_NOTIFICATION).unwrap();
        assert_eq!(
            h.read_descriptor(&dev, hrm, cccd, 0).unwrap(),
            ENABLE_NOTIFICATION
        );
        // Unrecognized configuration values are ignored.
        h.write_descriptor(&dev, hrm, cccd, &[0x02, 0x00]).unwrap();
        assert!(h.subscribers().contains(&dev));
        // Explicit disable.
        h.write_descriptor(&dev, hrm, cccd, &DISABLE_NOTIFICATION).unwrap();
        assert_eq!(
            h.read_descriptor(&dev, hrm, cccd, 0).unwrap(),
            DISABLE_NOTIFICATION
        );
        h.write_descriptor(&dev, hrm, cccd, &ENABLE_NOTIFICATION).unwrap();
        // Disconnect drops the subscription.
        h.connection_changed(&dev, false);
        assert_eq!(
            h.read_descriptor(&dev, hrm, cccd, 0).unwrap(),
            DISABLE_NOTIFICATION
        );
    }

    #[test]
    fn body_sensor_location() {
        let h = handler();
        let dev = DeviceId::from("AA:BB");
        let v = h
            .read_characteristic(&dev, Uuid::BODY_SENSOR_LOCATION, 0)
            .unwrap();
        assert_eq!(decode_body_sensor_location(&v), Ok(BodySensorLocation::Wrist));
    }

    #[test]
    fn control_point() {
        let h = handler();
        let dev = DeviceId::from("AA:BB");
        let cp = Uuid::HEART_RATE_CONTROL_POINT;
        h.set_energy_expended(Some(300));
        h.write_characteristic(&dev, cp, &[0x01]).unwrap();
        assert_eq!(h.energy_expended(), Some(0));
        // Undefined commands fail without side effects.
        h.set_energy_expended(Some(300));
        let e = h.write_characteristic(&dev, cp, &[0x02]).unwrap_err();
        assert_eq!(e.status(), ErrorCode::ValueNotAllowed);
        let e = h.write_characteristic(&dev, cp, &[0x01, 0x00]).unwrap_err();
        assert_eq!(e.status(), ErrorCode::InvalidAttributeValueLength);
        assert_eq!(h.energy_expended(), Some(300));
    }

    #[test]
    fn no_partial_write() {
        let h = handler();
        h.set_measurement(100, Some(50)).unwrap();
        assert_matches!(h.set_measurement(70_000, Some(10)), Err(RangeError { .. }));
        let m = decode_measurement(&h.measurement_value()).unwrap();
        assert_eq!((m.heart_rate, m.energy_expended), (100, Some(50)));
    }

    #[test]
    fn concurrent_value_access() {
        let h = handler();
        let valid = [(100, Some(50)), (200, Some(60)), (300, None)];
        std::thread::scope(|s| {
            for _ in 0..2 {
                s.spawn(|| {
                    for i in 0..500 {
                        let (hr, ee) = valid[i % valid.len()];
                        h.set_measurement(hr, ee).unwrap();
                        // Out-of-range writes must never tear the value.
                        let _ = h.set_measurement(70_000, Some(10));
                    }
                });
            }
            s.spawn(|| {
                for _ in 0..1000 {
                    let v = h.measurement_value();
                    if v.is_empty() {
                        continue;
                    }
                    let m = decode_measurement(&v).unwrap();
                    let got = (u32::from(m.heart_rate), m.energy_expended.map(u32::from));
                    assert!(valid.contains(&got), "torn read: {got:?}");
                }
            });
        });
    }

    #[tokio::test(start_paused = true)]
    async fn notify_failure_is_independent() {
        let sensor = Arc::new(LatestBpm::new());
        sensor.set(72);
        let h = HeartRateHandler::new(
            Arc::clone(&sensor) as Arc<dyn HeartRateSource>,
            BodySensorLocation::Chest,
            NotifyConfig::default(),
        );
        let t = Arc::new(FakeTransport::default());
        let srv = Server::new(Arc::clone(&t) as Arc<dyn Transport>);
        srv.register_service(Arc::clone(&h) as Arc<dyn ServiceHandler>);
        let (a, b) = (DeviceId::from("AA:BB"), DeviceId::from("CC:DD"));
        h.subscribers().add(a.clone());
        h.subscribers().add(b.clone());
        // The first device in snapshot order fails; the second must still
        // be notified.
        t.fail_notify(a);
        srv.start();
        tokio::time::sleep(Duration::from_secs(2)).await;
        let sent = t.take_notifications();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].dev, b);
        assert_eq!(
            decode_measurement(&sent[0].value).map(|m| m.heart_rate),
            Ok(72)
        );
        srv.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn notify_cycle() {
        let sensor = Arc::new(LatestBpm::new());
        let h = HeartRateHandler::new(
            Arc::clone(&sensor) as Arc<dyn HeartRateSource>,
            BodySensorLocation::Chest,
            NotifyConfig::default(),
        );
        let t = Arc::new(FakeTransport::default());
        let srv = Server::new(Arc::clone(&t) as Arc<dyn Transport>);
        srv.register_service(Arc::clone(&h) as Arc<dyn ServiceHandler>);
        let dev = DeviceId::from("AA:BB");
        srv.descriptor_write_request(
            &dev,
            1,
            Uuid::HEART_RATE_MEASUREMENT,
            Uuid::CLIENT_CHARACTERISTIC_CONFIGURATION,
            &ENABLE_NOTIFICATION,
            true,
        );
        srv.start();

        // No reading yet: the tick is skipped and the value untouched.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(t.take_notifications().is_empty());
        assert!(h.measurement_value().is_empty());

        sensor.set(72);
        tokio::time::sleep(Duration::from_secs(30)).await;
        let sent = t.take_notifications();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].dev, dev);
        assert_eq!(sent[0].char_uuid, Uuid::HEART_RATE_MEASUREMENT);
        let m = decode_measurement(&sent[0].value).unwrap();
        assert_eq!((m.heart_rate, m.energy_expended), (72, None));
        assert_eq!(h.measurement_value(), sent[0].value);

        // No subscribers: the value still updates, nothing is sent.
        srv.connection_state_changed(&dev, false);
        sensor.set(80);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(t.take_notifications().is_empty());
        let m = decode_measurement(&h.measurement_value()).unwrap();
        assert_eq!(m.heart_rate, 80);

        srv.stop().await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(t.take_notifications().is_empty());
    }
}
