use super::{device, UdevDeviceError};
use futures::{Stream, StreamExt};
use peripheral_access::Device;
use pin_project::pin_project;
use std::{
  io,
  pin::Pin,
  task::{Context, Poll},
};
use thiserror::Error;
use tokio::{
  runtime::Builder,
  select,
  sync::{
    mpsc::{channel, error::SendError, Receiver, Sender},
    oneshot::{self, error::RecvError},
  },
  task::{JoinError, LocalSet},
};
use tokio_udev::{AsyncMonitorSocket, EventType};
use tracing::{event, Level};

#[derive(Clone, Debug)]
pub enum UdevEvent {
  Add { syspath: String, device: Device },

  /// Removal events carry no attributes, only the syspath.
  Remove { syspath: String },
}

impl UdevEvent {
  /// `None` for event types nobody listens to.
  fn from_udev(value: &tokio_udev::Event) -> Option<Result<Self, UdevDeviceError>> {
    let udev_device = value.device();
    let event = match value.event_type() {
      EventType::Add => device::syspath(&udev_device).and_then(|syspath| {
        Ok(UdevEvent::Add {
          syspath,
          device: device::from_udev(&udev_device)?,
        })
      }),
      EventType::Remove => device::syspath(&udev_device).map(|syspath| UdevEvent::Remove { syspath }),
      _ => return None,
    };

    Some(event)
  }
}

#[derive(Debug, Error)]
pub enum UdevBuilderError {
  #[error("Failed to send command to owning thread")]
  SendError,

  #[error("Failed to receive response from owning thread")]
  ReceiveError,

  #[error(transparent)]
  Io(#[from] io::Error),

  #[error(transparent)]
  Join(#[from] JoinError),
}

impl<T> From<SendError<T>> for UdevBuilderError {
  fn from(_: SendError<T>) -> Self {
    Self::SendError
  }
}

impl From<RecvError> for UdevBuilderError {
  fn from(_: RecvError) -> Self {
    Self::ReceiveError
  }
}

type Reply<T> = oneshot::Sender<Result<T, UdevBuilderError>>;

enum BuilderCommand {
  /// Adds a filter that matches events for devices with the given subsystem and device type.
  MatchSubsystemDevtype(&'static str, &'static str, Reply<()>),

  /// Listens for events matching the current filters.
  Listen(Reply<(Receiver<Result<UdevEvent, UdevDeviceError>>, oneshot::Sender<()>)>),
}

/// The monitor socket is not `Send`, so it lives on its own thread with a
/// single-threaded runtime. Commands and events cross over channels.
pub struct UdevEventStreamBuilder {
  sender: Sender<BuilderCommand>,
}

impl UdevEventStreamBuilder {
  pub fn new() -> Result<Self, UdevBuilderError> {
    let (sender, receiver) = channel(1);
    std::thread::Builder::new()
      .name("udev-event-stream".into())
      .spawn(move || {
        if let Err(error) = Self::bg_thread(receiver) {
          event!(target: "usb-access-manager", Level::ERROR, ?error, "udev thread failed");
        }
      })?;

    Ok(Self { sender })
  }

  pub async fn match_subsystem_devtype(
    self,
    subsystem: &'static str,
    devtype: &'static str,
  ) -> Result<Self, UdevBuilderError> {
    let (sender, receiver) = oneshot::channel();
    self
      .sender
      .send(BuilderCommand::MatchSubsystemDevtype(subsystem, devtype, sender))
      .await?;
    receiver.await??;
    Ok(self)
  }

  /// Listens for events matching the current filters.
  pub async fn listen(self) -> Result<EventStream, UdevBuilderError> {
    let (sender, receiver) = oneshot::channel();
    self.sender.send(BuilderCommand::Listen(sender)).await?;
    let (receiver, signal) = receiver.await??;

    Ok(EventStream { receiver, signal })
  }

  fn bg_thread(receiver: Receiver<BuilderCommand>) -> Result<(), UdevBuilderError> {
    let rt = Builder::new_current_thread().enable_all().build()?;
    let local = LocalSet::new();
    let handle = local.spawn_local(Self::bg_task(receiver));
    rt.block_on(local);
    rt.block_on(handle)?
  }

  async fn bg_task(mut receiver: Receiver<BuilderCommand>) -> Result<(), UdevBuilderError> {
    let mut builder = tokio_udev::MonitorBuilder::new()?;
    let (mut socket, sender, signal_receiver) = loop {
      match receiver.recv().await {
        Some(BuilderCommand::MatchSubsystemDevtype(subsystem, devtype, ret)) => {
          builder = match builder.match_subsystem_devtype(subsystem, devtype) {
            Ok(builder) => {
              let _ = ret.send(Ok(()));
              builder
            }
            Err(e) => {
              let _ = ret.send(Err(e.into()));
              return Ok(());
            }
          }
        }

        Some(BuilderCommand::Listen(ret)) => match builder.listen().and_then(AsyncMonitorSocket::new) {
          Ok(socket) => {
            let (sender, receiver) = channel(16);
            let (signal_sender, signal_receiver) = oneshot::channel();
            let _ = ret.send(Ok((receiver, signal_sender)));
            break (socket, sender, signal_receiver);
          }
          Err(e) => {
            let _ = ret.send(Err(e.into()));
            return Ok(());
          }
        },

        None => return Ok(()),
      }
    };

    let mut signal = futures::stream::once(signal_receiver);
    loop {
      let e = select! {
        _ = signal.next() => return Ok(()),
        e = socket.next() => match e { None => return Ok(()), Some(e) => e },
      };

      let to_send = match e {
        Err(e) => Err(e.into()),
        Ok(evt) => match UdevEvent::from_udev(&evt) {
          None => continue,
          Some(Ok(evt)) => Ok(evt),
          Some(Err(error)) => {
            let udev_device = evt.device();
            event!(
              target: "usb-access-manager",
              Level::WARN,
              ?error,
              syspath = %udev_device.syspath().display(),
              "ignoring udev event"
            );
            continue;
          }
        },
      };

      if sender.send(to_send).await.is_err() {
        return Ok(());
      }
    }
  }
}

#[pin_project]
pub struct EventStream {
  signal: oneshot::Sender<()>,

  #[pin]
  receiver: Receiver<Result<UdevEvent, UdevDeviceError>>,
}

impl Stream for EventStream {
  type Item = Result<UdevEvent, UdevDeviceError>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    self.project().receiver.poll_recv(cx)
  }
}
