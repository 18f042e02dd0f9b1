//! Declarative peripheral filters.
//!
//! A filter is what an application claims to support: every field is either
//! a concrete value or a wildcard (`None`). There are two distinct notions of
//! "same" for filters and they must not be merged:
//!
//! - [`Filter::matches`] compares a filter against a concrete peripheral and
//!   honours wildcards. It is used to discover candidate applications.
//! - `==` compares two filters and is only ever true when the left-hand side
//!   has no wildcard at all. A filter containing a wildcard is not even equal
//!   to itself, which is why filters implement `PartialEq` but not `Eq` or
//!   `Hash`. Preference lookups use `==`, so a stored wildcard preference is
//!   never found by an exact lookup.

use crate::peripheral::{Accessory, Device, Field, Peripheral, PeripheralKind};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFilter {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub vendor_id: Option<u16>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub product_id: Option<u16>,

  /// Device or interface class
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub class: Option<u8>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub subclass: Option<u8>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub protocol: Option<u8>,
}

fn field_matches<T: PartialEq>(filter: &Option<T>, value: &T) -> bool {
  filter.as_ref().map_or(true, |f| f == value)
}

impl DeviceFilter {
  pub fn is_concrete(&self) -> bool {
    self.vendor_id.is_some()
      && self.product_id.is_some()
      && self.class.is_some()
      && self.subclass.is_some()
      && self.protocol.is_some()
  }

  fn matches_class(&self, class: u8, subclass: u8, protocol: u8) -> bool {
    field_matches(&self.class, &class)
      && field_matches(&self.subclass, &subclass)
      && field_matches(&self.protocol, &protocol)
  }

  pub fn matches(&self, device: &Device) -> bool {
    if !field_matches(&self.vendor_id, &device.vendor_id)
      || !field_matches(&self.product_id, &device.product_id)
    {
      return false;
    }

    // composite devices advertise their function on the interfaces
    self.matches_class(device.class, device.subclass, device.protocol)
      || device
        .interfaces
        .iter()
        .any(|i| self.matches_class(i.class, i.subclass, i.protocol))
  }
}

impl PartialEq for DeviceFilter {
  fn eq(&self, other: &DeviceFilter) -> bool {
    self.is_concrete()
      && self.vendor_id == other.vendor_id
      && self.product_id == other.product_id
      && self.class == other.class
      && self.subclass == other.subclass
      && self.protocol == other.protocol
  }
}

impl<'a> From<&'a Device> for DeviceFilter {
  fn from(device: &'a Device) -> Self {
    Self {
      vendor_id: Some(device.vendor_id),
      product_id: Some(device.product_id),
      class: Some(device.class),
      subclass: Some(device.subclass),
      protocol: Some(device.protocol),
    }
  }
}

impl fmt::Display for DeviceFilter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "DeviceFilter[vendorId={},productId={},class={},subclass={},protocol={}]",
      Field::wildcard(&self.vendor_id),
      Field::wildcard(&self.product_id),
      Field::wildcard(&self.class),
      Field::wildcard(&self.subclass),
      Field::wildcard(&self.protocol),
    )
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessoryFilter {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub manufacturer: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model: Option<String>,

  #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
  pub accessory_type: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
}

fn string_matches(filter: &Option<String>, value: &Option<String>) -> bool {
  match (filter, value) {
    (None, _) => true,
    (Some(f), Some(v)) => f == v,
    (Some(_), None) => false,
  }
}

impl AccessoryFilter {
  pub fn is_concrete(&self) -> bool {
    self.manufacturer.is_some()
      && self.model.is_some()
      && self.accessory_type.is_some()
      && self.version.is_some()
  }

  pub fn matches(&self, accessory: &Accessory) -> bool {
    string_matches(&self.manufacturer, &accessory.manufacturer)
      && string_matches(&self.model, &accessory.model)
      && string_matches(&self.accessory_type, &accessory.accessory_type)
      && string_matches(&self.version, &accessory.version)
  }
}

impl PartialEq for AccessoryFilter {
  fn eq(&self, other: &AccessoryFilter) -> bool {
    self.is_concrete()
      && self.manufacturer == other.manufacturer
      && self.model == other.model
      && self.accessory_type == other.accessory_type
      && self.version == other.version
  }
}

impl<'a> From<&'a Accessory> for AccessoryFilter {
  fn from(accessory: &'a Accessory) -> Self {
    Self {
      manufacturer: accessory.manufacturer.clone(),
      model: accessory.model.clone(),
      accessory_type: accessory.accessory_type.clone(),
      version: accessory.version.clone(),
    }
  }
}

impl fmt::Display for AccessoryFilter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "AccessoryFilter[manufacturer={},model={},type={},version={}]",
      Field::wildcard(&self.manufacturer),
      Field::wildcard(&self.model),
      Field::wildcard(&self.accessory_type),
      Field::wildcard(&self.version),
    )
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Filter {
  Device(DeviceFilter),
  Accessory(AccessoryFilter),
}

impl Filter {
  pub fn kind(&self) -> PeripheralKind {
    match self {
      Filter::Device(_) => PeripheralKind::Device,
      Filter::Accessory(_) => PeripheralKind::Accessory,
    }
  }

  pub fn is_concrete(&self) -> bool {
    match self {
      Filter::Device(f) => f.is_concrete(),
      Filter::Accessory(f) => f.is_concrete(),
    }
  }

  pub fn matches(&self, peripheral: &Peripheral) -> bool {
    match (self, peripheral) {
      (Filter::Device(f), Peripheral::Device(d)) => f.matches(d),
      (Filter::Accessory(f), Peripheral::Accessory(a)) => f.matches(a),
      _ => false,
    }
  }
}

impl PartialEq for Filter {
  fn eq(&self, other: &Filter) -> bool {
    match (self, other) {
      (Filter::Device(a), Filter::Device(b)) => a == b,
      (Filter::Accessory(a), Filter::Accessory(b)) => a == b,
      _ => false,
    }
  }
}

impl<'a> From<&'a Peripheral> for Filter {
  fn from(peripheral: &'a Peripheral) -> Self {
    match peripheral {
      Peripheral::Device(d) => Filter::Device(d.into()),
      Peripheral::Accessory(a) => Filter::Accessory(a.into()),
    }
  }
}

impl From<DeviceFilter> for Filter {
  fn from(filter: DeviceFilter) -> Self {
    Filter::Device(filter)
  }
}

impl From<AccessoryFilter> for Filter {
  fn from(filter: AccessoryFilter) -> Self {
    Filter::Accessory(filter)
  }
}

impl fmt::Display for Filter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Filter::Device(filter) => fmt::Display::fmt(filter, f),
      Filter::Accessory(filter) => fmt::Display::fmt(filter, f),
    }
  }
}
