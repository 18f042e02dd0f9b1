use crate::{
  peripheral::{PeripheralKey, Uid},
  Error,
};
use std::collections::{BTreeMap, BTreeSet};

/// Session grants: which uids may talk to which attached peripheral.
///
/// Nothing here is persisted. An entry lives from its first grant until the
/// peripheral detaches.
#[derive(Debug, Default)]
pub struct PermissionStore {
  grants: BTreeMap<PeripheralKey, BTreeSet<Uid>>,
}

impl PermissionStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn grant(&mut self, peripheral: PeripheralKey, uid: Uid) {
    self.grants.entry(peripheral).or_default().insert(uid);
  }

  pub fn has_permission(&self, peripheral: &PeripheralKey, uid: Uid) -> bool {
    self
      .grants
      .get(peripheral)
      .map_or(false, |uids| uids.contains(&uid))
  }

  pub fn check_permission(&self, peripheral: &PeripheralKey, uid: Uid) -> Result<(), Error> {
    if self.has_permission(peripheral, uid) {
      Ok(())
    } else {
      Err(Error::PermissionDenied {
        peripheral: peripheral.clone(),
        uid,
      })
    }
  }

  /// Drops every grant for the peripheral. Returns the uids that lost access.
  pub fn remove(&mut self, peripheral: &PeripheralKey) -> Option<BTreeSet<Uid>> {
    self.grants.remove(peripheral)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&PeripheralKey, &BTreeSet<Uid>)> {
    self.grants.iter()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::peripheral::Accessory;

  fn device(name: &str) -> PeripheralKey {
    PeripheralKey::Device(name.into())
  }

  #[test]
  fn grant_is_per_uid() {
    let mut store = PermissionStore::new();
    store.grant(device("/dev/bus/usb/001/002"), Uid(10001));

    assert!(store.has_permission(&device("/dev/bus/usb/001/002"), Uid(10001)));
    assert!(!store.has_permission(&device("/dev/bus/usb/001/002"), Uid(10002)));
    assert!(!store.has_permission(&device("/dev/bus/usb/001/003"), Uid(10001)));
  }

  #[test]
  fn grant_is_idempotent() {
    let mut store = PermissionStore::new();
    store.grant(device("/dev/bus/usb/001/002"), Uid(10001));
    store.grant(device("/dev/bus/usb/001/002"), Uid(10001));

    let (_, uids) = store.iter().next().unwrap();
    assert_eq!(uids.len(), 1);
  }

  #[test]
  fn check_permission_fails_without_grant() {
    let mut store = PermissionStore::new();
    let err = store
      .check_permission(&device("/dev/bus/usb/001/002"), Uid(10001))
      .unwrap_err();
    assert!(matches!(err, Error::PermissionDenied { uid: Uid(10001), .. }));

    store.grant(device("/dev/bus/usb/001/002"), Uid(10001));
    assert!(store
      .check_permission(&device("/dev/bus/usb/001/002"), Uid(10001))
      .is_ok());
  }

  #[test]
  fn remove_revokes_every_uid() {
    let mut store = PermissionStore::new();
    let key = device("/dev/bus/usb/001/002");
    store.grant(key.clone(), Uid(10001));
    store.grant(key.clone(), Uid(10002));

    let revoked = store.remove(&key).unwrap();
    assert_eq!(revoked.len(), 2);
    assert!(!store.has_permission(&key, Uid(10001)));
    assert!(!store.has_permission(&key, Uid(10002)));
    assert_eq!(store.iter().count(), 0);
  }

  #[test]
  fn accessories_are_keyed_by_value() {
    let mut store = PermissionStore::new();
    let accessory = Accessory {
      manufacturer: Some("Google, Inc.".into()),
      model: Some("DemoKit".into()),
      ..Default::default()
    };
    store.grant(PeripheralKey::Accessory(accessory.clone()), Uid(10001));

    assert!(store.has_permission(&PeripheralKey::Accessory(accessory), Uid(10001)));
  }
}
