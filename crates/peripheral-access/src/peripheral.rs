use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Linux-style user id of the process asking for access.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Uid(pub u32);

impl fmt::Display for Uid {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&self.0, f)
  }
}

/// Displays an optional field, with a placeholder when it is `None`.
pub(crate) struct Field<'a, T> {
  value: &'a Option<T>,
  placeholder: &'static str,
}

impl<'a, T> Field<'a, T> {
  /// `*` for a field that matches anything
  pub(crate) fn wildcard(value: &'a Option<T>) -> Self {
    Self {
      value,
      placeholder: "*",
    }
  }

  /// `null` for a field the peripheral does not report
  pub(crate) fn absent(value: &'a Option<T>) -> Self {
    Self {
      value,
      placeholder: "null",
    }
  }
}

impl<'a, T: fmt::Display> fmt::Display for Field<'a, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.value {
      Some(v) => fmt::Display::fmt(v, f),
      None => f.write_str(self.placeholder),
    }
  }
}

/// Class triple of a single interface exposed by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interface {
  pub class: u8,
  pub subclass: u8,
  pub protocol: u8,
}

impl Interface {
  pub fn new(class: u8, subclass: u8, protocol: u8) -> Self {
    Self {
      class,
      subclass,
      protocol,
    }
  }
}

/// A USB device as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Device {
  /// Stable device name, e.g. `/dev/bus/usb/001/004`
  pub name: String,
  pub vendor_id: u16,
  pub product_id: u16,
  pub class: u8,
  pub subclass: u8,
  pub protocol: u8,
  /// Interfaces in descriptor order
  pub interfaces: SmallVec<[Interface; 4]>,
}

impl fmt::Display for Device {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "UsbDevice[name={},vendorId={},productId={},class={},subclass={},protocol={},interfaces={}]",
      self.name,
      self.vendor_id,
      self.product_id,
      self.class,
      self.subclass,
      self.protocol,
      self.interfaces.len(),
    )
  }
}

/// An accessory speaking the accessory protocol. Any of its identifying
/// strings may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Accessory {
  pub manufacturer: Option<String>,
  pub model: Option<String>,
  pub accessory_type: Option<String>,
  pub version: Option<String>,
}

impl fmt::Display for Accessory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "UsbAccessory[manufacturer={},model={},type={},version={}]",
      Field::absent(&self.manufacturer),
      Field::absent(&self.model),
      Field::absent(&self.accessory_type),
      Field::absent(&self.version),
    )
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PeripheralKind {
  Device,
  Accessory,
}

impl fmt::Display for PeripheralKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PeripheralKind::Device => f.write_str("device"),
      PeripheralKind::Accessory => f.write_str("accessory"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Peripheral {
  Device(Device),
  Accessory(Accessory),
}

impl Peripheral {
  pub fn kind(&self) -> PeripheralKind {
    match self {
      Peripheral::Device(_) => PeripheralKind::Device,
      Peripheral::Accessory(_) => PeripheralKind::Accessory,
    }
  }

  /// Key under which grants for this peripheral are recorded.
  pub fn key(&self) -> PeripheralKey {
    match self {
      Peripheral::Device(device) => PeripheralKey::Device(device.name.clone()),
      Peripheral::Accessory(accessory) => PeripheralKey::Accessory(accessory.clone()),
    }
  }
}

impl From<Device> for Peripheral {
  fn from(device: Device) -> Self {
    Peripheral::Device(device)
  }
}

impl From<Accessory> for Peripheral {
  fn from(accessory: Accessory) -> Self {
    Peripheral::Accessory(accessory)
  }
}

impl fmt::Display for Peripheral {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Peripheral::Device(device) => fmt::Display::fmt(device, f),
      Peripheral::Accessory(accessory) => fmt::Display::fmt(accessory, f),
    }
  }
}

/// Devices are tracked by name, accessories by their full identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeripheralKey {
  Device(String),
  Accessory(Accessory),
}

impl fmt::Display for PeripheralKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PeripheralKey::Device(name) => f.write_str(name),
      PeripheralKey::Accessory(accessory) => fmt::Display::fmt(accessory, f),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accessory_display_shows_plain_values() {
    let accessory = Accessory {
      manufacturer: Some("Google, Inc.".into()),
      model: Some("DemoKit".into()),
      accessory_type: None,
      version: Some("1.0".into()),
    };

    assert_eq!(
      accessory.to_string(),
      "UsbAccessory[manufacturer=Google, Inc.,model=DemoKit,type=null,version=1.0]"
    );
    assert_eq!(
      PeripheralKey::Accessory(accessory).to_string(),
      "UsbAccessory[manufacturer=Google, Inc.,model=DemoKit,type=null,version=1.0]"
    );
  }
}
