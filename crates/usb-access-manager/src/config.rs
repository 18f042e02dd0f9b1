mod parse;
mod watch;

use futures::Stream;
use peripheral_access::Application;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, sync::Arc};

pub use parse::{ConfigError, ConfigFormat, FormatError};
pub use watch::ConfigWatcherError;

mod inner {
  use super::*;

  #[derive(Debug, Deserialize, Serialize, Clone)]
  #[serde(rename_all = "camelCase")]
  pub(super) struct Config {
    #[serde(default)]
    pub(super) applications: Vec<Application>,
  }
}

/// The application catalog: installed packages and the peripherals they
/// declare interest in.
#[derive(Clone)]
pub struct Config {
  inner: Arc<inner::Config>,
}

impl Config {
  pub fn applications(&self) -> &[Application] {
    &self.inner.applications
  }
}

impl From<inner::Config> for Config {
  fn from(inner: inner::Config) -> Self {
    Self {
      inner: Arc::new(inner),
    }
  }
}

impl fmt::Debug for Config {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(&*self.inner, f)
  }
}

impl Serialize for Config {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    Serialize::serialize(&*self.inner, serializer)
  }
}

impl<'de> Deserialize<'de> for Config {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    <inner::Config as Deserialize>::deserialize(deserializer).map(Self::from)
  }
}

impl Config {
  pub async fn read(file: impl AsRef<Path>, format: ConfigFormat) -> Result<Config, ConfigError> {
    parse::read_config(file, format).await
  }

  pub fn watch(
    file: impl AsRef<Path>,
    format: ConfigFormat,
  ) -> Result<impl Stream<Item = Result<Config, ConfigError>>, ConfigWatcherError> {
    watch::watch(file, format)
  }
}
