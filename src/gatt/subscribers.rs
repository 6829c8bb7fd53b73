use std::collections::BTreeSet;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::debug;

/// Opaque identifier of a connected central. Cheap to clone and compared
/// by value.
#[derive(Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct DeviceId(Arc<str>);

impl From<&str> for DeviceId {
    #[inline]
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl Debug for DeviceId {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for DeviceId {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Set of centrals subscribed to value notifications. Membership changes
/// and snapshots are serialized by an internal lock, so a device is never
/// half-added.
#[derive(Debug, Default)]
pub struct Subscribers(Mutex<BTreeSet<DeviceId>>);

impl Subscribers {
    /// Creates an empty subscriber set.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a device to the set. Adding an existing device is a no-op.
    pub fn add(&self, dev: DeviceId) {
        if self.0.lock().insert(dev.clone()) {
            debug!("Notification subscriber added: {dev}");
        }
    }

    /// Removes a device from the set. Removing an absent device is a
    /// no-op.
    pub fn remove(&self, dev: &DeviceId) {
        if self.0.lock().remove(dev) {
            debug!("Notification subscriber removed: {dev}");
        }
    }

    /// Removes every device from the set.
    pub fn clear(&self) {
        let mut set = self.0.lock();
        if !set.is_empty() {
            debug!("Removing all {} notification subscribers", set.len());
            set.clear();
        }
    }

    /// Returns whether a device is currently subscribed.
    #[must_use]
    pub fn contains(&self, dev: &DeviceId) -> bool {
        self.0.lock().contains(dev)
    }

    /// Returns whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Returns a point-in-time copy of the membership. Devices that
    /// subscribe or unsubscribe afterward do not affect the snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SmallVec<[DeviceId; 4]> {
        self.0.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership() {
        let s = Subscribers::new();
        let (a, b) = (DeviceId::from("AA:BB"), DeviceId::from("CC:DD"));
        assert!(s.is_empty());
        s.add(a.clone());
        s.add(a.clone());
        s.add(b.clone());
        assert!(s.contains(&a));
        assert_eq!(s.snapshot().len(), 2);
        s.remove(&a);
        s.remove(&a);
        assert!(!s.contains(&a));
        assert_eq!(s.snapshot().as_slice(), &[b]);
        s.clear();
        assert!(s.is_empty());
    }

    #[test]
    fn snapshot_is_stable() {
        let s = Subscribers::new();
        let a = DeviceId::from("AA:BB");
        s.add(a.clone());
        let snap = s.snapshot();
        s.remove(&a);
        assert_eq!(snap.as_slice(), &[a]);
        assert!(s.is_empty());
    }
}
