use peripheral_access::{Device, Interface};
use smallvec::SmallVec;
use std::{
  io,
  num::ParseIntError,
  path::{Path, PathBuf},
};
use thiserror::Error;
use tokio_udev::Enumerator;
use tracing::{event, Level};

pub(super) const SUBSYSTEM: &str = "usb";
pub(super) const DEVTYPE_DEVICE: &str = "usb_device";
const DEVTYPE_INTERFACE: &str = "usb_interface";

const ID_VENDOR: &str = "idVendor";
const ID_PRODUCT: &str = "idProduct";
const DEVICE_CLASS: &str = "bDeviceClass";
const DEVICE_SUBCLASS: &str = "bDeviceSubClass";
const DEVICE_PROTOCOL: &str = "bDeviceProtocol";
const INTERFACE_CLASS: &str = "bInterfaceClass";
const INTERFACE_SUBCLASS: &str = "bInterfaceSubClass";
const INTERFACE_PROTOCOL: &str = "bInterfaceProtocol";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathKind {
  SysPath,
  DevNode,
}

#[derive(Debug, Error)]
pub enum UdevDeviceError {
  #[error("Device path {path_kind:?} was not a valid string: {}", .value.display())]
  PathNotValidString { path_kind: PathKind, value: PathBuf },

  #[error("No devnode")]
  NoDevNode,

  #[error("Missing attribute {name}")]
  MissingAttribute { name: &'static str },

  #[error("Invalid value {value:?} for attribute {name}")]
  InvalidAttribute { name: &'static str, value: String },

  #[error(transparent)]
  Io(#[from] io::Error),
}

impl UdevDeviceError {
  fn invalid_path(path_kind: PathKind, value: impl Into<PathBuf>) -> Self {
    Self::PathNotValidString {
      path_kind,
      value: value.into(),
    }
  }
}

/// Sysfs attribute lookup.
pub(super) trait SysAttributes {
  fn sysattr(&self, name: &str) -> Option<&str>;
}

impl SysAttributes for tokio_udev::Device {
  fn sysattr(&self, name: &str) -> Option<&str> {
    self.attribute_value(name).and_then(|v| v.to_str())
  }
}

trait FromHex: Sized {
  fn from_hex(value: &str) -> Result<Self, ParseIntError>;
}

impl FromHex for u8 {
  fn from_hex(value: &str) -> Result<Self, ParseIntError> {
    u8::from_str_radix(value, 16)
  }
}

impl FromHex for u16 {
  fn from_hex(value: &str) -> Result<Self, ParseIntError> {
    u16::from_str_radix(value, 16)
  }
}

fn hex<T: FromHex>(attributes: &impl SysAttributes, name: &'static str) -> Result<T, UdevDeviceError> {
  let value = attributes
    .sysattr(name)
    .ok_or(UdevDeviceError::MissingAttribute { name })?
    .trim();

  T::from_hex(value).map_err(|_| UdevDeviceError::InvalidAttribute {
    name,
    value: value.into(),
  })
}

pub(super) fn interface(attributes: &impl SysAttributes) -> Result<Interface, UdevDeviceError> {
  Ok(Interface::new(
    hex(attributes, INTERFACE_CLASS)?,
    hex(attributes, INTERFACE_SUBCLASS)?,
    hex(attributes, INTERFACE_PROTOCOL)?,
  ))
}

pub(super) fn usb_device(
  name: String,
  attributes: &impl SysAttributes,
  interfaces: SmallVec<[Interface; 4]>,
) -> Result<Device, UdevDeviceError> {
  Ok(Device {
    name,
    vendor_id: hex(attributes, ID_VENDOR)?,
    product_id: hex(attributes, ID_PRODUCT)?,
    class: hex(attributes, DEVICE_CLASS)?,
    subclass: hex(attributes, DEVICE_SUBCLASS)?,
    protocol: hex(attributes, DEVICE_PROTOCOL)?,
    interfaces,
  })
}

pub(super) fn syspath(device: &tokio_udev::Device) -> Result<String, UdevDeviceError> {
  path_string(PathKind::SysPath, device.syspath())
}

fn path_string(path_kind: PathKind, path: &Path) -> Result<String, UdevDeviceError> {
  path
    .to_str()
    .map(String::from)
    .ok_or_else(|| UdevDeviceError::invalid_path(path_kind, path))
}

/// Interfaces of `device`, sorted by syspath.
fn interfaces(device: &tokio_udev::Device) -> Result<SmallVec<[Interface; 4]>, UdevDeviceError> {
  let mut enumerator = Enumerator::new()?;
  enumerator.match_parent(device)?;
  enumerator.match_subsystem(SUBSYSTEM)?;
  enumerator.match_property("DEVTYPE", DEVTYPE_INTERFACE)?;

  let mut found = Vec::new();
  for child in enumerator.scan_devices()? {
    match interface(&child) {
      Ok(interface) => found.push((child.syspath().to_owned(), interface)),
      Err(error) => {
        event!(target: "usb-access-manager", Level::DEBUG, ?error, syspath = %child.syspath().display(), "skipping interface");
      }
    }
  }

  found.sort_by(|(a, _), (b, _)| a.cmp(b));
  Ok(found.into_iter().map(|(_, interface)| interface).collect())
}

/// Identity of a `usb_device` node, named after its devnode.
pub(super) fn from_udev(device: &tokio_udev::Device) -> Result<Device, UdevDeviceError> {
  let devnode = device.devnode().ok_or(UdevDeviceError::NoDevNode)?;
  let name = path_string(PathKind::DevNode, devnode)?;
  usb_device(name, device, interfaces(device)?)
}

/// Every `usb_device` currently present, keyed by syspath.
pub fn scan_usb_devices() -> Result<Vec<(String, Device)>, UdevDeviceError> {
  let mut enumerator = Enumerator::new()?;
  enumerator.match_subsystem(SUBSYSTEM)?;
  enumerator.match_property("DEVTYPE", DEVTYPE_DEVICE)?;

  let mut devices = Vec::new();
  for device in enumerator.scan_devices()? {
    match syspath(&device).and_then(|syspath| Ok((syspath, from_udev(&device)?))) {
      Ok(entry) => devices.push(entry),
      Err(error) => {
        event!(target: "usb-access-manager", Level::WARN, ?error, syspath = %device.syspath().display(), "skipping usb device");
      }
    }
  }

  Ok(devices)
}
