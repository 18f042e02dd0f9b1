//! Seams to the world outside the settings manager.

use crate::{
  consent::ConsentPrompt,
  filter::Filter,
  package::PackageName,
  peripheral::{Peripheral, PeripheralKind, Uid},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// An installed application that declares peripheral filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
  pub package: PackageName,
  pub uid: Uid,

  /// Shipped with the system image
  #[serde(default)]
  pub system: bool,

  #[serde(default)]
  pub filters: Vec<Filter>,
}

impl Application {
  pub fn handles(&self, peripheral: &Peripheral) -> bool {
    self.filters.iter().any(|f| f.matches(peripheral))
  }
}

#[derive(Debug, Error)]
pub enum CollaboratorError {
  #[error("{0} is unavailable")]
  Unavailable(&'static str),

  #[error("{collaborator} failed: {reason}")]
  Failed {
    collaborator: &'static str,
    reason: String,
  },
}

/// Application manifest lookups.
pub trait PackageCatalog: Send + Sync {
  /// Applications that declare at least one filter of the given kind.
  fn applications(&self, kind: PeripheralKind) -> Vec<Application>;

  /// The uid owning `package`.
  fn package_uid(&self, package: &str) -> Option<Uid>;
}

/// Starts applications and announces detachment.
pub trait Dispatcher: Send + Sync {
  fn launch(&self, application: &Application, peripheral: &Peripheral) -> Result<(), CollaboratorError>;

  fn detached(&self, peripheral: &Peripheral);
}

/// Lets the user pick one of several candidates. Fire and forget; the choice
/// comes back through the manager's preference and grant operations.
pub trait Chooser: Send + Sync {
  fn choose(&self, peripheral: &Peripheral, candidates: &[Application]) -> Result<(), CollaboratorError>;
}

/// Asks the user for a one-off grant.
pub trait ConsentUi: Send + Sync {
  fn request_consent(&self, prompt: ConsentPrompt) -> Result<(), CollaboratorError>;
}

#[derive(Clone)]
pub struct Collaborators {
  pub catalog: Arc<dyn PackageCatalog>,
  pub dispatcher: Arc<dyn Dispatcher>,
  pub chooser: Arc<dyn Chooser>,
  pub consent: Arc<dyn ConsentUi>,
}

impl Collaborators {
  pub(crate) fn candidates(&self, peripheral: &Peripheral) -> Vec<Application> {
    self
      .catalog
      .applications(peripheral.kind())
      .into_iter()
      .filter(|a| a.handles(peripheral))
      .collect()
  }

  pub(crate) fn owner(&self, package: &str) -> Option<Uid> {
    self.catalog.package_uid(package)
  }
}
