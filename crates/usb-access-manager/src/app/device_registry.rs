use crate::udev::{scan_usb_devices, UdevDeviceError, UdevEvent};
use peripheral_access::Device;
use std::collections::BTreeMap;
use tracing::{event, Level};

#[derive(Debug)]
pub enum Change {
  /// `replaced` is the device previously recorded at the same syspath.
  Attached {
    device: Device,
    replaced: Option<Device>,
  },
  Detached(Device),
}

/// Attached devices by syspath. Removal events only name the syspath, so
/// this is where the detached identity comes from.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
  devices: BTreeMap<String, Device>,
}

impl DeviceRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Records devices already present. Returns the ones not seen before.
  pub fn scan_devices(&mut self) -> Result<Vec<Device>, UdevDeviceError> {
    event!(target: "usb-access-manager", Level::DEBUG, "gathering usb devices");
    let devices = scan_usb_devices()?;
    event!(target: "usb-access-manager", Level::DEBUG, devices.len = devices.len(), "gathered {} usb devices", devices.len());

    Ok(
      devices
        .into_iter()
        .filter_map(|(syspath, device)| match self.update(UdevEvent::Add { syspath, device }) {
          Some(Change::Attached { device, .. }) => Some(device),
          _ => None,
        })
        .collect(),
    )
  }

  pub fn update(&mut self, event: UdevEvent) -> Option<Change> {
    match event {
      UdevEvent::Add { syspath, device } => {
        if self.devices.get(&syspath) == Some(&device) {
          event!(target: "usb-access-manager", Level::DEBUG, %syspath, "device already known");
          return None;
        }

        let replaced = self.devices.insert(syspath, device.clone());
        Some(Change::Attached { device, replaced })
      }

      UdevEvent::Remove { syspath } => match self.devices.remove(&syspath) {
        Some(device) => Some(Change::Detached(device)),
        None => {
          event!(target: "usb-access-manager", Level::DEBUG, %syspath, "unknown device removed");
          None
        }
      },
    }
  }

  pub fn len(&self) -> usize {
    self.devices.len()
  }
}
