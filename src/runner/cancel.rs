//! Capacity-1 cancellation slot
//!
//! External sources push into the slot without ever blocking. While one
//! notification is pending, later ones are dropped. The task loop drains the
//! slot with a non-blocking check at every task boundary.

use std::fmt;

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

/// Where a cancellation request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// SIGINT / Ctrl-C
    Interrupt,
    /// SIGTERM
    Terminate,
    /// Requested in-process through a [`CancelHandle`]
    Requested,
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupt::Interrupt => write!(f, "interrupt"),
            Interrupt::Terminate => write!(f, "terminate"),
            Interrupt::Requested => write!(f, "requested"),
        }
    }
}

/// Create a slot. The sender side is handed out as [`CancelHandle`]s.
pub(crate) fn slot() -> (CancelHandle, CancelReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (CancelHandle { tx }, CancelReceiver { rx })
}

/// Cloneable, non-blocking producer side of the slot
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: mpsc::Sender<Interrupt>,
}

impl CancelHandle {
    /// Request cancellation of the batch.
    ///
    /// Returns `true` if the request is now pending, `false` if it was
    /// coalesced into one already pending or the runner is gone.
    pub fn cancel(&self) -> bool {
        self.notify(Interrupt::Requested)
    }

    /// Push a notification of the given kind into the slot
    pub fn notify(&self, interrupt: Interrupt) -> bool {
        match self.tx.try_send(interrupt) {
            Ok(()) => {
                tracing::debug!("Cancellation pending: {}", interrupt);
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::trace!("Cancellation already pending, dropping {}", interrupt);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Consumer side, owned by the task loop
#[derive(Debug)]
pub(crate) struct CancelReceiver {
    rx: mpsc::Receiver<Interrupt>,
}

impl CancelReceiver {
    /// Take the pending notification, if any, without waiting
    pub(crate) fn take(&mut self) -> Option<Interrupt> {
        match self.rx.try_recv() {
            Ok(interrupt) => Some(interrupt),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}
