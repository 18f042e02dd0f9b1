use crate::{
  package::PackageName,
  peripheral::{Peripheral, Uid},
};
use futures::channel::oneshot;
use std::fmt;
use tracing::{event, Level};

/// Handle for a permission request waiting on the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConsentId(pub(crate) u64);

impl fmt::Display for ConsentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&self.0, f)
  }
}

/// What the consent UI is asked to show. The answer goes back through
/// [`PeripheralSettingsManager::complete_consent`] with the same `id`.
///
/// [`PeripheralSettingsManager::complete_consent`]: crate::PeripheralSettingsManager::complete_consent
#[derive(Debug, Clone)]
pub struct ConsentPrompt {
  pub id: ConsentId,
  pub peripheral: Peripheral,
  pub package: PackageName,
  pub uid: Uid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionResponse {
  pub peripheral: Peripheral,
  pub granted: bool,
}

/// Where the outcome of a permission request is delivered.
#[derive(Debug)]
pub struct ResponseChannel(oneshot::Sender<PermissionResponse>);

impl ResponseChannel {
  pub fn new() -> (ResponseChannel, oneshot::Receiver<PermissionResponse>) {
    let (sender, receiver) = oneshot::channel();
    (ResponseChannel(sender), receiver)
  }

  pub(crate) fn respond(self, peripheral: Peripheral, granted: bool) {
    if self.0.send(PermissionResponse { peripheral, granted }).is_err() {
      event!(target: "peripheral-access", Level::WARN, granted, "permission response channel was cancelled");
    }
  }
}

#[derive(Debug)]
pub(crate) struct PendingConsent {
  pub(crate) peripheral: Peripheral,
  pub(crate) package: PackageName,
  pub(crate) uid: Uid,
  pub(crate) responder: ResponseChannel,
}
