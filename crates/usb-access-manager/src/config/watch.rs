use super::{Config, ConfigError, ConfigFormat};
use async_stream::stream;
use futures::{Stream, StreamExt};
use notify::{event::EventKind, RecursiveMode, Watcher as WatcherTrait};
use pin_project::pin_project;
use std::{
  path::Path,
  pin::Pin,
  task::{Context, Poll},
};
use thiserror::Error;
use tokio::{
  io,
  sync::mpsc::{self, UnboundedReceiver},
};
use tracing::{event, Level};

#[pin_project]
struct Watcher {
  watcher: notify::RecommendedWatcher,

  #[pin]
  receiver: UnboundedReceiver<notify::Result<notify::Event>>,
}

impl Watcher {
  fn new() -> Result<Self, ConfigWatcherError> {
    let (sender, receiver) = mpsc::unbounded_channel();
    let watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
      let _ = sender.send(event);
    })?;

    Ok(Self { watcher, receiver })
  }

  fn watch(
    &mut self,
    path: impl AsRef<Path>,
    recursive_mode: RecursiveMode,
  ) -> Result<(), ConfigWatcherError> {
    Ok(self.watcher.watch(path.as_ref(), recursive_mode)?)
  }

  /// Drops events already queued, so one save triggers one reload.
  fn drain(&mut self) {
    while self.receiver.try_recv().is_ok() {}
  }
}

impl Stream for Watcher {
  type Item = notify::Result<notify::Event>;

  fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    self.receiver.poll_recv(cx)
  }
}

#[derive(Debug, Error)]
pub enum ConfigWatcherError {
  #[error(transparent)]
  Notify(#[from] notify::Error),

  #[error(transparent)]
  Io(#[from] io::Error),
}

pub fn watch(
  file: impl AsRef<Path>,
  format: ConfigFormat,
) -> Result<impl Stream<Item = Result<Config, ConfigError>>, ConfigWatcherError> {
  let file = file.as_ref().to_owned();
  let mut watcher = Watcher::new()?;
  watcher.watch(&file, RecursiveMode::NonRecursive)?;

  Ok(stream! {
    while let Some(event) = watcher.next().await {
      match event {
        Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
          watcher.drain();
          yield Config::read(&file, format).await;
        }
        Ok(_) => {}
        Err(error) => {
          event!(target: "usb-access-manager", Level::WARN, ?error, "config watcher error");
        }
      }
    }
  })
}
