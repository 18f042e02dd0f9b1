mod device;
mod event_stream;

use event_stream::UdevEventStreamBuilder;
use futures::Stream;

pub use device::{scan_usb_devices, UdevDeviceError};
pub use event_stream::{UdevBuilderError, UdevEvent};

pub struct Udev;

impl Udev {
  /// Add and remove events of `usb_device` nodes.
  pub async fn watch(
  ) -> Result<impl Stream<Item = Result<UdevEvent, UdevDeviceError>>, UdevBuilderError> {
    UdevEventStreamBuilder::new()?
      .match_subsystem_devtype(device::SUBSYSTEM, device::DEVTYPE_DEVICE)
      .await?
      .listen()
      .await
  }
}
