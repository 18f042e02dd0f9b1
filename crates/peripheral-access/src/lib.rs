//! Access control and default-application resolution for USB peripherals.
//!
//! [`PeripheralSettingsManager`] tracks which uids may use each attached
//! device or accessory, remembers which application should handle a kind of
//! peripheral, and decides on attach whether to grant access right away or
//! let the user choose. Everything outside that decision (installed
//! applications, launching, user prompts) is reached through the traits in
//! [`host`].

mod consent;
mod error;
mod filter;
pub mod host;
mod manager;
mod package;
mod peripheral;
mod permissions;
mod preferences;
mod resolver;

pub use consent::{ConsentId, ConsentPrompt, PermissionResponse, ResponseChannel};
pub use error::Error;
pub use filter::{AccessoryFilter, DeviceFilter, Filter};
pub use host::{
  Application, Chooser, CollaboratorError, Collaborators, ConsentUi, Dispatcher, PackageCatalog,
};
pub use manager::PeripheralSettingsManager;
pub use package::PackageName;
pub use peripheral::{Accessory, Device, Interface, Peripheral, PeripheralKey, PeripheralKind, Uid};
pub use permissions::PermissionStore;
pub use preferences::{PersistenceError, PreferenceEntry, PreferenceStore, SettingsFile};
pub use resolver::AttachOutcome;
