//! External interrupt sources
//!
//! A source subscribes a [`CancelHandle`] to something outside the runner
//! (an OS signal, an admin channel) and hands back a [`Subscription`]. The
//! runner releases the subscription once a cancellation was consumed or the
//! batch completed, so a later signal is never attributed to a finished run.

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::cancel::{CancelHandle, Interrupt};

/// Something that can feed cancellation requests into a runner
pub trait InterruptSource: Send + Sync {
    /// Start forwarding notifications to `handle`.
    ///
    /// Called from inside the tokio runtime that drives `Runner::start`.
    fn subscribe(&self, handle: CancelHandle) -> Subscription;
}

/// Live registration with an interrupt source. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    listeners: Vec<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap the listener tasks forwarding into the slot
    pub fn new(listeners: Vec<JoinHandle<()>>) -> Self {
        Self { listeners }
    }

    #[cfg(test)]
    fn is_active(&self) -> bool {
        self.listeners.iter().any(|l| !l.is_finished())
    }

    /// Stop all listeners. Safe to call from any thread, more than once.
    pub fn unsubscribe(&mut self) {
        for listener in self.listeners.drain(..) {
            listener.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// OS signal names accepted in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalName {
    /// SIGINT / Ctrl-C
    Interrupt,
    /// SIGTERM (unix only)
    Terminate,
}

impl std::fmt::Display for SignalName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalName::Interrupt => write!(f, "interrupt"),
            SignalName::Terminate => write!(f, "terminate"),
        }
    }
}

impl std::str::FromStr for SignalName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "interrupt" | "int" | "sigint" => Ok(SignalName::Interrupt),
            "terminate" | "term" | "sigterm" => Ok(SignalName::Terminate),
            other => Err(format!(
                "unknown signal '{}': expected 'interrupt' or 'terminate'",
                other
            )),
        }
    }
}

/// Process-level signals as an interrupt source
#[derive(Debug, Clone)]
pub struct OsSignals {
    signals: Vec<SignalName>,
}

impl Default for OsSignals {
    fn default() -> Self {
        Self::interrupt()
    }
}

impl OsSignals {
    /// Listen for the given signals
    pub fn new(signals: impl IntoIterator<Item = SignalName>) -> Self {
        let mut unique = Vec::new();
        for signal in signals {
            if !unique.contains(&signal) {
                unique.push(signal);
            }
        }
        Self { signals: unique }
    }

    /// SIGINT only
    pub fn interrupt() -> Self {
        Self::new([SignalName::Interrupt])
    }

    /// Signals this source listens for
    pub fn signals(&self) -> &[SignalName] {
        &self.signals
    }
}

impl InterruptSource for OsSignals {
    fn subscribe(&self, handle: CancelHandle) -> Subscription {
        let listeners = self
            .signals
            .iter()
            .filter_map(|signal| listen(*signal, handle.clone()))
            .collect();
        Subscription::new(listeners)
    }
}

/// Register the OS handler now and forward every delivery into the slot.
///
/// Registration is synchronous so a signal sent right after `subscribe`
/// returns is not missed.
#[cfg(unix)]
fn listen(name: SignalName, handle: CancelHandle) -> Option<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let (kind, interrupt) = match name {
        SignalName::Interrupt => (SignalKind::interrupt(), Interrupt::Interrupt),
        SignalName::Terminate => (SignalKind::terminate(), Interrupt::Terminate),
    };

    let mut stream = match signal(kind) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!("Failed to register {} handler: {}", name, e);
            return None;
        }
    };

    tracing::debug!("Listening for {}", name);
    Some(tokio::spawn(async move {
        while stream.recv().await.is_some() {
            handle.notify(interrupt);
        }
    }))
}

#[cfg(not(unix))]
fn listen(name: SignalName, handle: CancelHandle) -> Option<JoinHandle<()>> {
    match name {
        SignalName::Interrupt => Some(tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                    return;
                }
                handle.notify(Interrupt::Interrupt);
            }
        })),
        SignalName::Terminate => {
            tracing::warn!("SIGTERM is not available on this platform, ignoring");
            None
        }
    }
}
