use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::*;

/// GATT service hosting a fixed set of characteristics. The tree is
/// transport-independent: request routing resolves the logical attribute
/// targeted by a protocol-level read/write through UUID lookup.
#[derive(Debug)]
pub struct Service {
    uuid: Uuid,
    chars: BTreeMap<Uuid, Characteristic>,
}

impl Service {
    /// Creates a service owning the given characteristics.
    ///
    /// # Panics
    ///
    /// Panics if two characteristics share a UUID.
    pub fn new(uuid: Uuid, chars: impl IntoIterator<Item = Characteristic>) -> Self {
        let mut map = BTreeMap::new();
        for ch in chars {
            assert!(
                map.insert(ch.uuid, ch).is_none(),
                "duplicate characteristic UUID in service {uuid}"
            );
        }
        Self { uuid, chars: map }
    }

    /// Returns the service UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns whether the service hosts the specified characteristic.
    #[inline]
    #[must_use]
    pub fn has_characteristic(&self, uuid: Uuid) -> bool {
        self.chars.contains_key(&uuid)
    }

    /// Returns the characteristic with the specified UUID.
    pub fn characteristic(&self, uuid: Uuid) -> Result<&Characteristic> {
        self.chars.get(&uuid).ok_or(Error::NotFound {
            kind: "characteristic",
            uuid,
        })
    }

    /// Returns a descriptor resolved through its owning characteristic.
    pub fn descriptor(&self, char_uuid: Uuid, desc_uuid: Uuid) -> Result<&Descriptor> {
        self.characteristic(char_uuid)?.descriptor(desc_uuid)
    }
}

/// Characteristic with its declared properties, permissions, descriptors,
/// and current value. The value is an opaque byte sequence mutated only
/// through validated setters.
#[derive(Debug)]
pub struct Characteristic {
    uuid: Uuid,
    props: Prop,
    access: Access,
    descs: BTreeMap<Uuid, Descriptor>,
    val: Mutex<Vec<u8>>,
}

impl Characteristic {
    /// Creates a characteristic owning the given descriptors.
    ///
    /// # Panics
    ///
    /// Panics if two descriptors share a UUID.
    pub fn new(
        uuid: Uuid,
        props: Prop,
        access: Access,
        descs: impl IntoIterator<Item = Descriptor>,
    ) -> Self {
        let mut map = BTreeMap::new();
        for d in descs {
            assert!(
                map.insert(d.uuid, d).is_none(),
                "duplicate descriptor UUID in characteristic {uuid}"
            );
        }
        Self {
            uuid,
            props,
            access,
            descs: map,
            val: Mutex::new(Vec::new()),
        }
    }

    /// Returns the characteristic UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the declared properties.
    #[inline(always)]
    #[must_use]
    pub const fn props(&self) -> Prop {
        self.props
    }

    /// Returns the descriptor with the specified UUID.
    pub fn descriptor(&self, uuid: Uuid) -> Result<&Descriptor> {
        self.descs.get(&uuid).ok_or(Error::NotFound {
            kind: "descriptor",
            uuid,
        })
    }

    /// Handles a remote read request, returning the current value starting
    /// at `offset`.
    pub fn read(&self, offset: usize) -> Result<Vec<u8>> {
        self.require(Prop::READ, Access::READ)?;
        let v = self.val.lock();
        (v.get(offset..)).map(<[u8]>::to_vec).ok_or(Error::InvalidOffset {
            uuid: self.uuid,
            offset,
        })
    }

    /// Handles a remote write request, replacing the current value.
    pub fn write(&self, value: &[u8]) -> Result<()> {
        self.require(Prop::WRITE | Prop::WRITE_WITHOUT_RESPONSE, Access::WRITE)?;
        *self.val.lock() = value.to_vec();
        Ok(())
    }

    /// Returns a copy of the current value without a permission check
    /// (local, trusted path).
    #[must_use]
    pub fn value(&self) -> Vec<u8> {
        self.val.lock().clone()
    }

    /// Replaces the current value without a permission check (local,
    /// trusted path). Callers validate through the codec first.
    pub(crate) fn set_value(&self, value: &[u8]) {
        *self.val.lock() = value.to_vec();
    }

    /// Verifies that the characteristic declares at least one of `props`
    /// and permits the requested access.
    fn require(&self, props: Prop, access: Access) -> Result<()> {
        if !self.props.intersects(props) || self.access.test(access).is_err() {
            return Err(Error::PermissionDenied {
                uuid: self.uuid,
                access,
            });
        }
        Ok(())
    }
}

/// Descriptor attached to a characteristic.
#[derive(Debug)]
pub struct Descriptor {
    uuid: Uuid,
    access: Access,
}

impl Descriptor {
    /// Creates a descriptor.
    #[inline]
    #[must_use]
    pub const fn new(uuid: Uuid, access: Access) -> Self {
        Self { uuid, access }
    }

    /// Returns the descriptor UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the declared access permissions.
    #[inline(always)]
    #[must_use]
    pub const fn access(&self) -> Access {
        self.access
    }
}
