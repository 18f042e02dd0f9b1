mod args;
mod device_registry;

use self::{
  args::{Args, ConfigFormat, LogFormat},
  device_registry::{Change, DeviceRegistry},
};
use crate::{
  catalog::Catalog,
  config::{Config, ConfigError},
  host::Journal,
  signals::Signal,
  udev::{Udev, UdevDeviceError, UdevEvent},
};
use clap::Parser;
use color_eyre::{
  eyre::{eyre, Context},
  Result,
};
use futures::{pin_mut, select, StreamExt};
use peripheral_access::{Collaborators, Device, Peripheral, PeripheralSettingsManager, SettingsFile};
use std::{path::PathBuf, sync::Arc};
use tracing::{event, Level};
use tracing_subscriber::EnvFilter;

enum Action {
  None,
  Restart,
  Scan,
  Shutdown,
}

struct App {
  config_file: PathBuf,
  config_format: ConfigFormat,
  catalog: Arc<Catalog>,
  manager: PeripheralSettingsManager,
  devices: DeviceRegistry,
}

impl App {
  async fn new(args: Args) -> Result<Self> {
    let config = Config::read(&args.config_file, args.config_format.into())
      .await
      .context("reading application catalog")?;
    let catalog = Arc::new(Catalog::new(&config));

    let journal = Arc::new(Journal);
    let collaborators = Collaborators {
      catalog: catalog.clone(),
      dispatcher: journal.clone(),
      chooser: journal.clone(),
      consent: journal,
    };
    let manager = PeripheralSettingsManager::new(SettingsFile::new(args.settings_file), collaborators);

    Ok(App {
      config_file: args.config_file,
      config_format: args.config_format,
      catalog,
      manager,
      devices: DeviceRegistry::new(),
    })
  }

  async fn run(&mut self) -> Result<()> {
    let config_stream = Config::watch(&self.config_file, self.config_format.into())?.fuse();
    pin_mut!(config_stream);

    let signal_stream = Signal::watch()?.fuse();
    pin_mut!(signal_stream);

    let udev_event_stream = Udev::watch().await?.fuse();
    pin_mut!(udev_event_stream);

    let mut action = Action::Scan;
    loop {
      action = match action {
        Action::Shutdown => break,
        Action::Restart => self.restart().await,
        Action::Scan => self.scan(),
        Action::None => select! {
          c = config_stream.next() => self.on_config(c),
          s = signal_stream.next() => self.on_signal(s),
          e = udev_event_stream.next() => self.on_udev(e),
        },
      }?;
    }

    Ok(())
  }

  fn apply(&self, config: Config) {
    for package in self.catalog.update(&config) {
      self.manager.on_package_removed(package.as_str());
    }
  }

  async fn restart(&mut self) -> Result<Action> {
    // a broken catalog keeps the previous one; the reader logs why
    if let Ok(config) = Config::read(&self.config_file, self.config_format.into()).await {
      self.apply(config);
    }

    Ok(Action::None)
  }

  fn scan(&mut self) -> Result<Action> {
    let attached = match self.devices.scan_devices() {
      Ok(attached) => attached,
      Err(e) => {
        event!(
          target: "usb-access-manager",
          Level::ERROR,
          "Failed to read usb devices: {:#?}",
          e
        );
        return Err(e).context("device scan");
      }
    };

    for device in attached {
      self.attach(device);
    }

    Ok(Action::None)
  }

  fn attach(&self, device: Device) {
    let peripheral = Peripheral::from(device);
    let outcome = self.manager.on_attach(&peripheral);
    event!(
      target: "usb-access-manager",
      Level::INFO,
      %peripheral,
      ?outcome,
      devices.len = self.devices.len(),
      "device attached"
    );
  }

  fn detach(&self, device: Device) {
    let peripheral = Peripheral::from(device);
    self.manager.on_detach(&peripheral);
  }

  fn on_config(&mut self, config: Option<Result<Config, ConfigError>>) -> Result<Action> {
    match config {
      None => {
        event!(
          target: "usb-access-manager",
          Level::ERROR,
          "Config watcher closed."
        );

        Err(eyre!("config watcher closed")).context("on_config")
      }

      // already logged, keep serving with the previous catalog
      Some(Err(_)) => Ok(Action::None),

      Some(Ok(c)) => {
        self.apply(c);
        Ok(Action::None)
      }
    }
  }

  fn on_signal(&mut self, signal: Option<Signal>) -> Result<Action> {
    match signal {
      None => {
        event!(
          target: "usb-access-manager",
          Level::ERROR,
          "Signal stream stopped, shutting down.",
        );

        Err(eyre!("signal stream stopped")).context("on_signal")
      }

      Some(Signal::SigHup) => {
        event!(target: "usb-access-manager", Level::INFO, "Received SIGHUP, reloading");
        Ok(Action::Restart)
      }

      Some(Signal::SigUsr1) => {
        event!(target: "usb-access-manager", Level::INFO, "USB settings state:\n{}", self.manager.dump());
        Ok(Action::None)
      }

      Some(s) => {
        event!(
          target: "usb-access-manager",
          Level::INFO,
          "Received signal {}, shutting down.",
          s
        );
        Ok(Action::Shutdown)
      }
    }
  }

  fn on_udev(&mut self, event: Option<Result<UdevEvent, UdevDeviceError>>) -> Result<Action> {
    match event {
      None => {
        event!(
          target: "usb-access-manager",
          Level::ERROR,
          "Udev stream stopped, shutting down.",
        );

        Err(eyre!("udev stream stopped")).context("on_udev")
      }

      Some(Err(e)) => {
        event!(
          target: "usb-access-manager",
          Level::ERROR,
          "Udev stream got an error, shutting down: {:#?}",
          e
        );

        Err(e).context("on_udev")
      }

      Some(Ok(e)) => {
        match self.devices.update(e) {
          Some(Change::Attached { device, replaced }) => {
            if let Some(previous) = replaced {
              self.detach(previous);
            }
            self.attach(device);
          }
          Some(Change::Detached(device)) => self.detach(device),
          None => {}
        }

        Ok(Action::None)
      }
    }
  }
}

pub async fn run() -> Result<()> {
  let args = Args::parse();
  let filter = EnvFilter::from_default_env()
    // Set the base level when not matched by other directives to INFO.
    .add_directive(tracing::Level::INFO.into());

  match args.log_format {
    LogFormat::Pretty => {
      tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    LogFormat::Json => {
      tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(false)
        .with_span_list(false)
        .init();
    }
  }

  let mut app = App::new(args).await?;
  app.run().await?;

  Ok(())
}
