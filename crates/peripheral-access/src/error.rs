use crate::{
  consent::ConsentId,
  package::PackageName,
  peripheral::{PeripheralKey, Uid},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The caller holds no grant for the peripheral and should request one.
  #[error("User has not given uid {uid} permission to {peripheral}")]
  PermissionDenied { peripheral: PeripheralKey, uid: Uid },

  #[error("Package {package} does not match caller's uid {uid}")]
  IdentityMismatch { package: PackageName, uid: Uid },

  #[error("Package {0} not found")]
  PackageNotFound(String),

  #[error("No pending consent request with id {0}")]
  UnknownConsent(ConsentId),
}
