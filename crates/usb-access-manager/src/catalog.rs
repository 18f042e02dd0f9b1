use crate::config::Config;
use arc_swap::ArcSwap;
use peripheral_access::{Application, PackageCatalog, PackageName, PeripheralKind, Uid};
use std::{collections::BTreeSet, sync::Arc};
use tracing::{event, Level};

/// The installed applications, swapped wholesale on every config reload.
pub struct Catalog {
  applications: ArcSwap<Vec<Application>>,
}

impl Catalog {
  pub fn new(config: &Config) -> Self {
    Self {
      applications: ArcSwap::from_pointee(config.applications().to_vec()),
    }
  }

  /// Replaces the catalog and returns the packages that disappeared.
  pub fn update(&self, config: &Config) -> Vec<PackageName> {
    let previous = self
      .applications
      .swap(Arc::new(config.applications().to_vec()));
    let current: BTreeSet<PackageName> = config.applications().iter().map(|a| a.package).collect();

    let removed: Vec<PackageName> = previous
      .iter()
      .map(|a| a.package)
      .filter(|p| !current.contains(p))
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect();
    event!(
      target: "usb-access-manager",
      Level::DEBUG,
      applications.len = current.len(),
      removed.len = removed.len(),
      "updated application catalog"
    );

    removed
  }
}

impl PackageCatalog for Catalog {
  fn applications(&self, kind: PeripheralKind) -> Vec<Application> {
    self
      .applications
      .load()
      .iter()
      .filter(|a| a.filters.iter().any(|f| f.kind() == kind))
      .cloned()
      .collect()
  }

  fn package_uid(&self, package: &str) -> Option<Uid> {
    self
      .applications
      .load()
      .iter()
      .find(|a| a.package == package)
      .map(|a| a.uid)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config(json: &str) -> Config {
    serde_json::from_str(json).unwrap()
  }

  const BOTH: &str = r#"{ "applications": [
    { "package": "com.android.mtp", "uid": 1000, "system": true, "filters": [{ "kind": "device", "class": 6 }] },
    { "package": "com.example.kit", "uid": 10003, "filters": [{ "kind": "accessory", "model": "DemoKit" }] }
  ] }"#;

  #[test]
  fn filters_applications_by_kind() {
    let catalog = Catalog::new(&config(BOTH));

    let devices = catalog.applications(PeripheralKind::Device);
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].package, "com.android.mtp");

    let accessories = catalog.applications(PeripheralKind::Accessory);
    assert_eq!(accessories.len(), 1);
    assert_eq!(accessories[0].package, "com.example.kit");
  }

  #[test]
  fn looks_up_package_owner() {
    let catalog = Catalog::new(&config(BOTH));

    assert_eq!(catalog.package_uid("com.example.kit"), Some(Uid(10003)));
    assert_eq!(catalog.package_uid("com.example.gone"), None);
  }

  #[test]
  fn update_reports_removed_packages() {
    let catalog = Catalog::new(&config(BOTH));
    let removed = catalog.update(&config(
      r#"{ "applications": [{ "package": "com.android.mtp", "uid": 1000, "filters": [] }] }"#,
    ));

    assert_eq!(removed, vec![PackageName::new("com.example.kit")]);
    assert_eq!(catalog.package_uid("com.example.kit"), None);
    assert!(catalog.applications(PeripheralKind::Device).is_empty());
  }
}
