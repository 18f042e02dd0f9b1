use crate::{
  consent::{ConsentId, ConsentPrompt, PendingConsent, ResponseChannel},
  filter::Filter,
  host::Collaborators,
  package::PackageName,
  peripheral::{Peripheral, PeripheralKey, Uid},
  permissions::PermissionStore,
  preferences::{PreferenceStore, SettingsFile},
  resolver::{self, AttachOutcome, Resolution},
  Error,
};
use parking_lot::Mutex;
use std::{collections::BTreeMap, fmt};
use tracing::{event, Level};

struct State {
  permissions: PermissionStore,
  preferences: PreferenceStore,
  pending: BTreeMap<ConsentId, PendingConsent>,
  next_consent: u64,
  /// Attach generation of every peripheral between `on_attach` and `on_detach`
  attached: BTreeMap<PeripheralKey, u64>,
  next_attach: u64,
}

impl State {
  fn new(preferences: PreferenceStore) -> Self {
    Self {
      permissions: PermissionStore::new(),
      preferences,
      pending: BTreeMap::new(),
      next_consent: 1,
      attached: BTreeMap::new(),
      next_attach: 1,
    }
  }

  fn attach(&mut self, key: PeripheralKey) -> u64 {
    let generation = self.next_attach;
    self.next_attach += 1;
    self.attached.insert(key, generation);
    generation
  }

  fn register(&mut self, pending: PendingConsent) -> ConsentId {
    let id = ConsentId(self.next_consent);
    self.next_consent += 1;
    self.pending.insert(id, pending);
    id
  }
}

impl fmt::Display for State {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fn uids<'a>(f: &mut fmt::Formatter<'_>, uids: impl Iterator<Item = &'a Uid>) -> fmt::Result {
      for uid in uids {
        write!(f, " {}", uid)?;
      }
      writeln!(f)
    }

    writeln!(f, "Device permissions:")?;
    for (key, granted) in self.permissions.iter() {
      if let PeripheralKey::Device(name) = key {
        write!(f, "  {}:", name)?;
        uids(f, granted.iter())?;
      }
    }

    writeln!(f, "Accessory permissions:")?;
    for (key, granted) in self.permissions.iter() {
      if let PeripheralKey::Accessory(accessory) = key {
        write!(f, "  {}:", accessory)?;
        uids(f, granted.iter())?;
      }
    }

    writeln!(f, "Device preferences:")?;
    for entry in self.preferences.iter() {
      if let Filter::Device(filter) = &entry.filter {
        writeln!(f, "  {}: {}", filter, entry.package)?;
      }
    }

    writeln!(f, "Accessory preferences:")?;
    for entry in self.preferences.iter() {
      if let Filter::Accessory(filter) = &entry.filter {
        writeln!(f, "  {}: {}", filter, entry.package)?;
      }
    }

    Ok(())
  }
}

/// Decides who may use attached peripherals and which application handles
/// them by default.
///
/// All session grants and remembered defaults live behind one lock. The
/// collaborators are always called with the lock released, so they are free
/// to call back into the manager.
pub struct PeripheralSettingsManager {
  state: Mutex<State>,
  host: Collaborators,
}

impl PeripheralSettingsManager {
  /// Loads remembered defaults from `settings`.
  pub fn new(settings: SettingsFile, host: Collaborators) -> Self {
    Self {
      state: Mutex::new(State::new(PreferenceStore::open(settings))),
      host,
    }
  }

  /// A manager whose defaults are forgotten when it is dropped.
  pub fn in_memory(host: Collaborators) -> Self {
    Self {
      state: Mutex::new(State::new(PreferenceStore::in_memory())),
      host,
    }
  }

  /// Resolves who handles a newly attached peripheral.
  ///
  /// The preference lookup and the default grant happen in one critical
  /// section, and only while this attach is still current: a detach that
  /// lands during the catalog lookup leaves nothing granted.
  pub fn on_attach(&self, peripheral: &Peripheral) -> AttachOutcome {
    let key = peripheral.key();
    let generation = self.state.lock().attach(key.clone());
    let candidates = self.host.candidates(peripheral);

    let resolution = {
      let mut state = self.state.lock();
      if state.attached.get(&key) != Some(&generation) {
        event!(target: "peripheral-access", Level::DEBUG, %peripheral, "peripheral detached while resolving");
        return AttachOutcome::NoCandidate;
      }

      let preferred = if candidates.is_empty() {
        None
      } else {
        state.preferences.preference(&Filter::from(peripheral))
      };
      let resolution = resolver::resolve(candidates, preferred);
      if let Resolution::Launch(application) = &resolution {
        state.permissions.grant(key, application.uid);
      }
      resolution
    };

    match resolution {
      Resolution::NoCandidate => {
        event!(target: "peripheral-access", Level::DEBUG, %peripheral, "no application handles peripheral");
        AttachOutcome::NoCandidate
      }

      Resolution::Launch(application) => {
        event!(
          target: "peripheral-access",
          Level::INFO,
          %peripheral,
          package = %application.package,
          uid = %application.uid,
          "granted peripheral to default application"
        );

        if let Err(error) = self.host.dispatcher.launch(&application, peripheral) {
          event!(
            target: "peripheral-access",
            Level::ERROR,
            ?error,
            package = %application.package,
            "failed to launch default application"
          );
        }

        AttachOutcome::AutoGranted {
          package: application.package,
          uid: application.uid,
        }
      }

      Resolution::Choose(candidates) => match self.host.chooser.choose(peripheral, &candidates) {
        Ok(()) => {
          event!(
            target: "peripheral-access",
            Level::DEBUG,
            %peripheral,
            candidates = candidates.len(),
            "asked user to choose an application"
          );
          AttachOutcome::AwaitingUserChoice {
            candidates: candidates.len(),
          }
        }
        Err(error) => {
          event!(target: "peripheral-access", Level::ERROR, ?error, %peripheral, "chooser failed");
          AttachOutcome::NoCandidate
        }
      },
    }
  }

  /// Revokes every grant for the peripheral and turns down consent requests
  /// still waiting on it.
  pub fn on_detach(&self, peripheral: &Peripheral) {
    let key = peripheral.key();
    let cancelled = {
      let mut state = self.state.lock();
      state.attached.remove(&key);
      if let Some(revoked) = state.permissions.remove(&key) {
        event!(
          target: "peripheral-access",
          Level::DEBUG,
          %peripheral,
          revoked = revoked.len(),
          "revoked grants for detached peripheral"
        );
      }

      let ids: Vec<ConsentId> = state
        .pending
        .iter()
        .filter(|(_, p)| p.peripheral.key() == key)
        .map(|(id, _)| *id)
        .collect();
      ids
        .into_iter()
        .filter_map(|id| state.pending.remove(&id))
        .collect::<Vec<_>>()
    };

    for pending in cancelled {
      pending.responder.respond(pending.peripheral, false);
    }

    self.host.dispatcher.detached(peripheral);
  }

  pub fn has_permission(&self, peripheral: &Peripheral, uid: Uid) -> bool {
    self
      .state
      .lock()
      .permissions
      .has_permission(&peripheral.key(), uid)
  }

  pub fn check_permission(&self, peripheral: &Peripheral, uid: Uid) -> Result<(), Error> {
    self
      .state
      .lock()
      .permissions
      .check_permission(&peripheral.key(), uid)
  }

  pub fn grant_permission(&self, peripheral: &Peripheral, uid: Uid) {
    self.state.lock().permissions.grant(peripheral.key(), uid);
    event!(target: "peripheral-access", Level::DEBUG, %peripheral, %uid, "granted permission");
  }

  /// Asks for a one-off grant on behalf of `package`, running as `caller`.
  ///
  /// The answer is delivered through `responder`, immediately when the
  /// caller already holds a grant, otherwise once the consent UI answers
  /// through [`complete_consent`](Self::complete_consent).
  pub fn request_permission(
    &self,
    peripheral: &Peripheral,
    package: &str,
    caller: Uid,
    responder: ResponseChannel,
  ) -> Result<(), Error> {
    if self.has_permission(peripheral, caller) {
      responder.respond(peripheral.clone(), true);
      return Ok(());
    }

    // interned only once the catalog knows it
    let owner = self
      .host
      .owner(package)
      .ok_or_else(|| Error::PackageNotFound(package.into()))?;
    let package = PackageName::new(package);
    if owner != caller {
      event!(
        target: "peripheral-access",
        Level::WARN,
        %package,
        %owner,
        %caller,
        "permission request from uid not owning package"
      );
      return Err(Error::IdentityMismatch {
        package,
        uid: caller,
      });
    }

    let id = self.state.lock().register(PendingConsent {
      peripheral: peripheral.clone(),
      package,
      uid: caller,
      responder,
    });

    let prompt = ConsentPrompt {
      id,
      peripheral: peripheral.clone(),
      package,
      uid: caller,
    };
    if let Err(error) = self.host.consent.request_consent(prompt) {
      event!(target: "peripheral-access", Level::ERROR, ?error, %package, "consent UI failed");
      let pending = self.state.lock().pending.remove(&id);
      if let Some(pending) = pending {
        pending.responder.respond(pending.peripheral, false);
      }
    }

    Ok(())
  }

  /// Answers the consent request `id`, granting on approval.
  pub fn complete_consent(&self, id: ConsentId, granted: bool) -> Result<(), Error> {
    let pending = {
      let mut state = self.state.lock();
      let pending = state.pending.remove(&id).ok_or(Error::UnknownConsent(id))?;
      if granted {
        state.permissions.grant(pending.peripheral.key(), pending.uid);
      }
      pending
    };

    event!(
      target: "peripheral-access",
      Level::DEBUG,
      %id,
      package = %pending.package,
      uid = %pending.uid,
      granted,
      "consent answered"
    );
    pending.responder.respond(pending.peripheral, granted);
    Ok(())
  }

  /// Remembers (or with `None` forgets) the default application for
  /// peripherals described by `filter`. Returns whether anything changed.
  pub fn set_preference(&self, filter: Filter, package: Option<PackageName>) -> bool {
    self.state.lock().preferences.set_preference(filter, package)
  }

  /// Same as [`set_preference`](Self::set_preference) with the filter
  /// describing exactly this peripheral.
  pub fn set_peripheral_package(&self, peripheral: &Peripheral, package: Option<PackageName>) -> bool {
    self.set_preference(Filter::from(peripheral), package)
  }

  pub fn preference(&self, filter: &Filter) -> Option<PackageName> {
    self.state.lock().preferences.preference(filter)
  }

  pub fn has_defaults(&self, package: &str) -> bool {
    self.state.lock().preferences.has_defaults(package)
  }

  /// Forgets every default naming `package`.
  pub fn clear_preferences(&self, package: &str) -> bool {
    self.state.lock().preferences.purge_package(package)
  }

  /// Called when `package` is uninstalled.
  pub fn on_package_removed(&self, package: &str) {
    if self.clear_preferences(package) {
      event!(target: "peripheral-access", Level::INFO, package, "cleared defaults of removed package");
    }
  }

  /// Human readable listing of grants and defaults.
  pub fn dump(&self) -> String {
    self.state.lock().to_string()
  }
}
