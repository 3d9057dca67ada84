//! Termination signal sources.

use std::fmt;

use tokio::sync::mpsc;

/// Signal that started the shutdown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
    Quit,
    /// Requested through a [`ShutdownTrigger`].
    Manual,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TerminationSignal::Interrupt => "SIGINT",
            TerminationSignal::Terminate => "SIGTERM",
            TerminationSignal::Quit => "SIGQUIT",
            TerminationSignal::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Programmatic shutdown request handle.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: mpsc::UnboundedSender<TerminationSignal>,
}

impl ShutdownTrigger {
    /// Requests shutdown as [`TerminationSignal::Manual`].
    pub fn trigger(&self) {
        self.raise(TerminationSignal::Manual);
    }

    /// Requests shutdown as if `signal` had been delivered.
    ///
    /// Only the first request reaches the watcher; later ones are ignored.
    pub fn raise(&self, signal: TerminationSignal) {
        let _ = self.tx.send(signal);
    }
}

pub(super) enum SignalSource {
    Os(OsSignals),
    Manual(mpsc::UnboundedReceiver<TerminationSignal>),
}

impl SignalSource {
    pub(super) fn manual() -> (Self, ShutdownTrigger) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SignalSource::Manual(rx), ShutdownTrigger { tx })
    }

    /// Next signal. `None` if the source can no longer produce one.
    pub(super) async fn recv(&mut self) -> Option<TerminationSignal> {
        match self {
            SignalSource::Os(signals) => signals.recv().await,
            SignalSource::Manual(rx) => rx.recv().await,
        }
    }
}

/// OS signal streams, installed eagerly so early signals are buffered.
#[cfg(unix)]
pub(super) struct OsSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl OsSignals {
    pub(super) fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    async fn recv(&mut self) -> Option<TerminationSignal> {
        tokio::select! {
            Some(()) = self.interrupt.recv() => Some(TerminationSignal::Interrupt),
            Some(()) = self.terminate.recv() => Some(TerminationSignal::Terminate),
            Some(()) = self.quit.recv() => Some(TerminationSignal::Quit),
            else => None,
        }
    }
}

#[cfg(not(unix))]
pub(super) struct OsSignals;

#[cfg(not(unix))]
impl OsSignals {
    pub(super) fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> Option<TerminationSignal> {
        tokio::signal::ctrl_c()
            .await
            .ok()
            .map(|()| TerminationSignal::Interrupt)
    }
}
