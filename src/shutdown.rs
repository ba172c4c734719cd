//! Interrupt handling for the blocking control loop.
//!
//! The loop never awaits anything; it polls a [`ShutdownSignal`] between
//! scans. The async side only exists to receive OS signals and flip it.

use tokio::sync::watch;
use tracing::{info, warn};

/// Sets the shutdown flag.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Observes the shutdown flag.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

/// Create a connected trigger/signal pair.
pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

impl ShutdownTrigger {
    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl ShutdownSignal {
    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Wait for SIGINT or SIGTERM, then fire `trigger`.
pub async fn trigger_on_interrupt(trigger: ShutdownTrigger) {
    match interrupted().await {
        Ok(name) => {
            info!(signal = name, "Received interrupt, stopping after current scan");
            trigger.trigger();
        }
        Err(e) => warn!(error = %e, "Could not install signal handlers"),
    }
}

#[cfg(unix)]
async fn interrupted() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sigint.recv() => Ok("SIGINT"),
    }
}

#[cfg(not(unix))]
async fn interrupted() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_starts_clear() {
        let (_trigger, signal) = channel();
        assert!(!signal.is_triggered());
    }

    #[test]
    fn test_trigger_reaches_all_clones() {
        let (trigger, signal) = channel();
        let other = signal.clone();

        trigger.trigger();
        trigger.trigger();

        assert!(signal.is_triggered());
        assert!(other.is_triggered());
    }

    #[test]
    fn test_trigger_without_observers_does_not_panic() {
        let (trigger, signal) = channel();
        drop(signal);
        trigger.trigger();
    }
}
