use peripheral_access::{
  Application, Chooser, CollaboratorError, ConsentPrompt, ConsentUi, Dispatcher, Peripheral,
};
use tracing::{event, Level};

/// Collaborators for a headless host: there is nobody to launch or ask, so
/// every request is only recorded in the log.
pub struct Journal;

impl Dispatcher for Journal {
  fn launch(&self, application: &Application, peripheral: &Peripheral) -> Result<(), CollaboratorError> {
    event!(
      target: "usb-access-manager",
      Level::INFO,
      package = %application.package,
      uid = %application.uid,
      %peripheral,
      "launch application"
    );
    Ok(())
  }

  fn detached(&self, peripheral: &Peripheral) {
    event!(target: "usb-access-manager", Level::INFO, %peripheral, "peripheral detached");
  }
}

impl Chooser for Journal {
  fn choose(&self, peripheral: &Peripheral, candidates: &[Application]) -> Result<(), CollaboratorError> {
    let packages: Vec<_> = candidates.iter().map(|a| a.package.as_str()).collect();
    event!(
      target: "usb-access-manager",
      Level::INFO,
      %peripheral,
      ?packages,
      "user choice needed"
    );
    Ok(())
  }
}

impl ConsentUi for Journal {
  fn request_consent(&self, prompt: ConsentPrompt) -> Result<(), CollaboratorError> {
    event!(
      target: "usb-access-manager",
      Level::WARN,
      id = %prompt.id,
      package = %prompt.package,
      uid = %prompt.uid,
      peripheral = %prompt.peripheral,
      "no consent UI, denying"
    );
    Err(CollaboratorError::Unavailable("consent ui"))
  }
}
