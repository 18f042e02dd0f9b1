use futures::{future::ready, Stream, StreamExt};
use signal_hook_tokio::Signals;
use std::{fmt, io};
use thiserror::Error;
use tracing::{event, Level};

/// Signals the daemon reacts to, mapped from their raw numbers.
macro_rules! define_signals {
  (
    pub enum $name:ident {
      $($case:ident = $val:ident),+
      $(,)?
    }
  ) => {
    #[repr(i32)]
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub enum $name {
      $($case = ::signal_hook::consts::$val,)+
    }

    impl $name {
      const ALL: &'static [i32] = &[$(::signal_hook::consts::$val,)+];

      fn from_raw(value: i32) -> Option<Self> {
        match value {
          $(::signal_hook::consts::$val => Some(Self::$case),)+
          _ => None,
        }
      }

      fn name(self) -> &'static str {
        match self {
          $(Self::$case => stringify!($val),)+
        }
      }
    }
  };
}

define_signals! {
  pub enum Signal {
    SigTerm = SIGTERM,
    SigInt = SIGINT,
    SigQuit = SIGQUIT,
    SigHup = SIGHUP,
    SigUsr1 = SIGUSR1,
  }
}

impl fmt::Display for Signal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl fmt::Debug for Signal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Debug, Error)]
pub enum SignalWatchError {
  #[error(transparent)]
  Io(#[from] io::Error),
}

impl Signal {
  /// Termination signals, SIGHUP (reload) and SIGUSR1 (dump state).
  pub fn watch() -> Result<impl Stream<Item = Signal>, SignalWatchError> {
    let signals = Signals::new(Self::ALL)?;
    event!(target: "usb-access-manager", Level::DEBUG, "Started listening for signals");

    Ok(signals.filter_map(|s| ready(Signal::from_raw(s))))
  }
}
