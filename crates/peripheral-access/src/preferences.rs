mod codec;
mod settings_file;

use crate::{filter::Filter, package::PackageName};
use quick_xml::events::attributes::AttrError;
use std::io;
use thiserror::Error;
use tracing::{event, Level};

pub use settings_file::SettingsFile;

#[derive(Debug, Error)]
pub enum PersistenceError {
  #[error(transparent)]
  Io(#[from] io::Error),

  #[error("Malformed settings document")]
  Xml(#[from] quick_xml::Error),

  #[error("Malformed attribute in settings document")]
  Attribute(#[from] AttrError),

  #[error("Invalid value {value:?} for attribute '{name}'")]
  InvalidAttribute { name: &'static str, value: String },
}

/// A remembered default application for peripherals described by `filter`.
#[derive(Debug, Clone)]
pub struct PreferenceEntry {
  pub filter: Filter,
  pub package: PackageName,
}

/// Durable filter → package table.
///
/// Entries are kept in a list rather than a map because filter equality is
/// not reflexive for wildcard filters; every lookup goes through `==` on
/// [`Filter`] and therefore never finds a wildcard entry.
///
/// Every mutation that changes the table rewrites the whole settings file
/// before returning. Write failures are logged and the in-memory change is
/// kept.
#[derive(Debug)]
pub struct PreferenceStore {
  entries: Vec<PreferenceEntry>,
  file: Option<SettingsFile>,
}

impl PreferenceStore {
  /// A store without backing file.
  pub fn in_memory() -> Self {
    Self {
      entries: Vec::new(),
      file: None,
    }
  }

  /// Loads the store from `file`. A missing file is a first run; an
  /// unreadable one is deleted and the store starts empty.
  pub fn open(file: SettingsFile) -> Self {
    let entries = match file.load() {
      Ok(Some(entries)) => {
        event!(
          target: "peripheral-access",
          Level::DEBUG,
          path = %file.path().display(),
          preferences.len = entries.len(),
          "loaded {} preferences",
          entries.len()
        );
        entries
      }

      Ok(None) => {
        event!(target: "peripheral-access", Level::DEBUG, path = %file.path().display(), "settings file not found");
        Vec::new()
      }

      Err(error) => {
        event!(
          target: "peripheral-access",
          Level::ERROR,
          ?error,
          path = %file.path().display(),
          "error reading settings file, deleting to start fresh"
        );
        if let Err(error) = file.discard() {
          event!(target: "peripheral-access", Level::WARN, ?error, "failed to delete settings file");
        }
        Vec::new()
      }
    };

    Self {
      entries,
      file: Some(file),
    }
  }

  fn position(&self, filter: &Filter) -> Option<usize> {
    self.entries.iter().position(|e| e.filter == *filter)
  }

  /// Exact lookup. Never finds an entry stored under a wildcard filter.
  pub fn preference(&self, filter: &Filter) -> Option<PackageName> {
    self.position(filter).map(|i| self.entries[i].package)
  }

  /// Stores or (with `None`) removes the preference for `filter`. Returns
  /// whether the table changed; unchanged tables are not written.
  pub fn set_preference(&mut self, filter: Filter, package: Option<PackageName>) -> bool {
    let changed = match (self.position(&filter), package) {
      (Some(i), None) => {
        self.entries.remove(i);
        true
      }
      (None, None) => false,
      (Some(i), Some(package)) => {
        let entry = &mut self.entries[i];
        if entry.package == package {
          false
        } else {
          entry.package = package;
          true
        }
      }
      (None, Some(package)) => {
        self.entries.push(PreferenceEntry { filter, package });
        true
      }
    };

    if changed {
      self.persist();
    }

    changed
  }

  /// Removes every preference naming `package`.
  pub fn purge_package(&mut self, package: &str) -> bool {
    let before = self.entries.len();
    self.entries.retain(|e| e.package != package);
    let changed = self.entries.len() != before;

    if changed {
      event!(
        target: "peripheral-access",
        Level::DEBUG,
        package,
        removed = before - self.entries.len(),
        "cleared package defaults"
      );
      self.persist();
    }

    changed
  }

  pub fn has_defaults(&self, package: &str) -> bool {
    self.entries.iter().any(|e| e.package == package)
  }

  pub fn iter(&self) -> impl Iterator<Item = &PreferenceEntry> {
    self.entries.iter()
  }

  fn persist(&self) {
    let file = match &self.file {
      Some(file) => file,
      None => return,
    };

    match file.save(&self.entries) {
      Ok(()) => {
        event!(target: "peripheral-access", Level::DEBUG, path = %file.path().display(), "wrote settings file");
      }
      Err(error) => {
        event!(
          target: "peripheral-access",
          Level::ERROR,
          ?error,
          path = %file.path().display(),
          "error writing settings file"
        );
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::filter::{AccessoryFilter, DeviceFilter};
  use std::fs;
  use tempfile::TempDir;

  fn concrete(vendor_id: u16) -> Filter {
    Filter::Device(DeviceFilter {
      vendor_id: Some(vendor_id),
      product_id: Some(0x4ee1),
      class: Some(255),
      subclass: Some(66),
      protocol: Some(1),
    })
  }

  fn wildcard() -> Filter {
    Filter::Device(DeviceFilter {
      vendor_id: Some(0x18d1),
      product_id: Some(0x4ee1),
      ..Default::default()
    })
  }

  fn accessory() -> Filter {
    Filter::Accessory(AccessoryFilter {
      manufacturer: Some("Google, Inc.".into()),
      model: Some("DemoKit".into()),
      accessory_type: Some("board".into()),
      version: Some("1.0".into()),
    })
  }

  fn settings(dir: &TempDir) -> SettingsFile {
    SettingsFile::new(dir.path().join("usb_device_manager.xml"))
  }

  #[test]
  fn set_preference_reports_changes() {
    let mut store = PreferenceStore::in_memory();
    let app = PackageName::new("com.example.app");

    assert!(store.set_preference(concrete(0x18d1), Some(app)));
    assert!(!store.set_preference(concrete(0x18d1), Some(app)));
    assert_eq!(store.preference(&concrete(0x18d1)), Some(app));

    let other = PackageName::new("com.example.other");
    assert!(store.set_preference(concrete(0x18d1), Some(other)));
    assert_eq!(store.preference(&concrete(0x18d1)), Some(other));

    assert!(store.set_preference(concrete(0x18d1), None));
    assert!(!store.set_preference(concrete(0x18d1), None));
    assert_eq!(store.preference(&concrete(0x18d1)), None);
  }

  #[test]
  fn wildcard_preference_is_stored_but_unreachable() {
    let mut store = PreferenceStore::in_memory();
    let app = PackageName::new("com.example.app");

    assert!(store.set_preference(wildcard(), Some(app)));
    assert_eq!(store.preference(&wildcard()), None);
    assert!(store.has_defaults("com.example.app"));

    // removal by exact lookup cannot find it either
    assert!(!store.set_preference(wildcard(), None));
    assert_eq!(store.iter().count(), 1);
  }

  #[test]
  fn purge_package_only_removes_that_package() {
    let mut store = PreferenceStore::in_memory();
    let app = PackageName::new("com.example.app");
    let other = PackageName::new("com.example.other");
    store.set_preference(concrete(1), Some(app));
    store.set_preference(concrete(2), Some(other));
    store.set_preference(accessory(), Some(app));
    store.set_preference(wildcard(), Some(app));

    assert!(store.purge_package("com.example.app"));
    assert!(!store.has_defaults("com.example.app"));
    assert_eq!(store.preference(&concrete(2)), Some(other));
    assert_eq!(store.iter().count(), 1);

    assert!(!store.purge_package("com.example.app"));
  }

  #[test]
  fn round_trips_through_settings_file() {
    let dir = TempDir::new().unwrap();
    let app = PackageName::new("com.example.app");
    let other = PackageName::new("com.example.other");

    {
      let mut store = PreferenceStore::open(settings(&dir));
      store.set_preference(concrete(0x18d1), Some(app));
      store.set_preference(accessory(), Some(other));
    }

    let store = PreferenceStore::open(settings(&dir));
    assert_eq!(store.iter().count(), 2);
    assert_eq!(store.preference(&concrete(0x18d1)), Some(app));
    assert_eq!(store.preference(&accessory()), Some(other));
  }

  #[test]
  fn missing_file_starts_empty() {
    let dir = TempDir::new().unwrap();
    let store = PreferenceStore::open(settings(&dir));

    assert_eq!(store.iter().count(), 0);
    assert!(!dir.path().join("usb_device_manager.xml").exists());
  }

  #[test]
  fn corrupt_file_is_deleted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("usb_device_manager.xml");
    fs::write(
      &path,
      r#"<settings><preference package="a"><usb-device vendor-id="abc"/></preference></settings>"#,
    )
    .unwrap();

    let store = PreferenceStore::open(settings(&dir));
    assert_eq!(store.iter().count(), 0);
    assert!(!path.exists());
  }

  #[test]
  fn writes_only_when_changed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("usb_device_manager.xml");
    let mut store = PreferenceStore::open(settings(&dir));

    assert!(!store.set_preference(concrete(1), None));
    assert!(!store.purge_package("com.example.app"));
    assert!(!path.exists());

    assert!(store.set_preference(concrete(1), Some(PackageName::new("com.example.app"))));
    assert!(path.exists());

    fs::remove_file(&path).unwrap();
    assert!(store.purge_package("com.example.app"));
    assert!(path.exists());
  }

  #[test]
  fn failed_write_keeps_in_memory_change() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, b"").unwrap();

    let mut store = PreferenceStore::open(SettingsFile::new(blocker.join("settings.xml")));
    let app = PackageName::new("com.example.app");

    assert!(store.set_preference(concrete(1), Some(app)));
    assert_eq!(store.preference(&concrete(1)), Some(app));
  }
}
