use crate::{host::Application, package::PackageName, peripheral::Uid};

/// How an attach was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachOutcome {
  /// No application declares a matching filter, or nobody could be asked.
  NoCandidate,

  /// Permission was granted and the application launched without asking.
  AutoGranted { package: PackageName, uid: Uid },

  /// The candidates were handed to the chooser.
  AwaitingUserChoice { candidates: usize },
}

#[derive(Debug)]
pub(crate) enum Resolution {
  NoCandidate,
  Launch(Application),
  Choose(Vec<Application>),
}

/// Picks what to do with the candidates for an attached peripheral.
///
/// `preferred` is the result of the exact preference lookup; a lone system
/// application only wins when no preference exists at all.
pub(crate) fn resolve(mut candidates: Vec<Application>, preferred: Option<PackageName>) -> Resolution {
  if candidates.is_empty() {
    return Resolution::NoCandidate;
  }

  match preferred {
    None if candidates.len() == 1 && candidates[0].system => {
      Resolution::Launch(candidates.swap_remove(0))
    }
    Some(preferred) => match candidates.iter().position(|c| c.package == preferred) {
      Some(i) => Resolution::Launch(candidates.swap_remove(i)),
      None => Resolution::Choose(candidates),
    },
    None => Resolution::Choose(candidates),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn app(package: &str, uid: u32, system: bool) -> Application {
    Application {
      package: PackageName::new(package),
      uid: Uid(uid),
      system,
      filters: Vec::new(),
    }
  }

  fn launched(resolution: Resolution) -> Option<PackageName> {
    match resolution {
      Resolution::Launch(app) => Some(app.package),
      _ => None,
    }
  }

  #[test]
  fn no_candidates() {
    let resolution = resolve(Vec::new(), Some(PackageName::new("com.example.app")));
    assert!(matches!(resolution, Resolution::NoCandidate));
  }

  #[test]
  fn lone_system_candidate_is_launched() {
    let resolution = resolve(vec![app("com.android.mtp", 1000, true)], None);
    assert_eq!(launched(resolution), Some(PackageName::new("com.android.mtp")));
  }

  #[test]
  fn lone_user_candidate_needs_choice() {
    let resolution = resolve(vec![app("com.example.app", 10001, false)], None);
    assert!(matches!(resolution, Resolution::Choose(c) if c.len() == 1));
  }

  #[test]
  fn preferred_candidate_is_launched() {
    let candidates = vec![
      app("com.example.app", 10001, false),
      app("com.example.other", 10002, false),
    ];
    let resolution = resolve(candidates, Some(PackageName::new("com.example.other")));
    assert_eq!(launched(resolution), Some(PackageName::new("com.example.other")));
  }

  #[test]
  fn stale_preference_falls_back_to_choice() {
    // a preference disables the system shortcut even when it names nobody present
    let candidates = vec![app("com.android.mtp", 1000, true)];
    let resolution = resolve(candidates, Some(PackageName::new("com.example.gone")));
    assert!(matches!(resolution, Resolution::Choose(c) if c.len() == 1));
  }

  #[test]
  fn several_candidates_without_preference_need_choice() {
    let candidates = vec![
      app("com.android.mtp", 1000, true),
      app("com.example.app", 10001, false),
    ];
    assert!(matches!(resolve(candidates, None), Resolution::Choose(c) if c.len() == 2));
  }
}
