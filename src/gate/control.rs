//! The gate control loop.
//!
//! One scan is read, decided and, if admitted, actuated to completion
//! before the next one is read. The actuator is reset when the loop starts
//! and again on every way out of [`ControlLoop::run`].

use crate::cache::snapshot::SnapshotFile;
use crate::client::http::{HttpTransport, ReqwestTransport};
use crate::client::pager::PaginatedApiClient;
use crate::client::session::CredentialSession;
use crate::clock::SystemClock;
use crate::config::GateConfig;
use crate::gate::actuator::GateActuator;
use crate::gate::validator::{GateValidator, SyncReport};
use crate::input::{ScanEvent, ScanSource};
use crate::shutdown::ShutdownSignal;
use crate::GateError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// How long to wait for a scan before checking for shutdown again.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Counters for one run of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Result of the startup sync.
    pub sync: SyncReport,

    /// Non-blank codes processed.
    pub scans: u64,

    /// Codes admitted.
    pub allowed: u64,

    /// Codes denied.
    pub denied: u64,
}

/// Resets the actuator when dropped.
struct ResetOnExit<'a> {
    actuator: &'a mut Box<dyn GateActuator>,
}

impl Drop for ResetOnExit<'_> {
    fn drop(&mut self) {
        match self.actuator.reset() {
            Ok(()) => info!("Gate reset"),
            Err(e) => error!(error = %e, "Gate reset failed"),
        }
    }
}

/// Reads scans, validates them and drives the gate.
pub struct ControlLoop<T: HttpTransport = ReqwestTransport> {
    validator: GateValidator<T>,
    actuator: Box<dyn GateActuator>,
    open_duration: Duration,
    poll_interval: Duration,
}

impl ControlLoop<ReqwestTransport> {
    /// Build a control loop talking to the configured API over HTTPS.
    ///
    /// # Errors
    /// - `ConfigError` if the configuration is invalid
    /// - `Transport` if the HTTP client cannot be created
    pub fn new(config: GateConfig, actuator: Box<dyn GateActuator>) -> Result<Self, GateError> {
        config.validate()?;
        let transport = ReqwestTransport::new(config.request_timeout, config.user_agent.clone())?;
        Self::with_transport(config, transport, actuator)
    }
}

impl<T: HttpTransport> ControlLoop<T> {
    /// Build a control loop over any transport.
    pub fn with_transport(
        config: GateConfig,
        transport: T,
        actuator: Box<dyn GateActuator>,
    ) -> Result<Self, GateError> {
        config.validate()?;

        let session = CredentialSession::new(
            config.access_token,
            config.refresh_url,
            config.refresh_token,
        );
        let client =
            PaginatedApiClient::new(transport, session, config.api_base_url, config.page_delay);

        let mut validator = GateValidator::new(client, config.tail_pages)
            .with_miss_ttl(config.miss_ttl, Arc::new(SystemClock));
        if let Some(path) = config.snapshot_path {
            validator = validator.with_snapshot(SnapshotFile::new(path));
        }

        Ok(Self {
            validator,
            actuator,
            open_duration: config.open_duration,
            poll_interval: POLL_INTERVAL,
        })
    }

    /// Sync the admission cache, then serve scans until `shutdown` fires
    /// or `source` closes.
    ///
    /// The actuator is reset on return, whether the run ended normally,
    /// with an error, or by unwinding.
    pub fn run(
        &mut self,
        source: &mut dyn ScanSource,
        shutdown: &ShutdownSignal,
    ) -> Result<RunSummary, GateError> {
        let gate = ResetOnExit {
            actuator: &mut self.actuator,
        };
        gate.actuator.reset()?;

        let sync = self.validator.initial_sync()?;
        let mut summary = RunSummary {
            sync,
            scans: 0,
            allowed: 0,
            denied: 0,
        };
        info!("Ready for scans");

        while !shutdown.is_triggered() {
            let raw = match source.next_event(self.poll_interval)? {
                ScanEvent::Code(raw) => raw,
                ScanEvent::Idle => continue,
                ScanEvent::Closed => {
                    info!("Scanner input closed");
                    break;
                }
            };

            let code = raw.trim();
            if code.is_empty() {
                continue;
            }
            summary.scans += 1;

            let decision = self.validator.decide(code);
            if decision.allowed {
                summary.allowed += 1;
                info!(code, source = ?decision.source, "Admission allowed");
                gate.actuator.open(self.open_duration)?;
            } else {
                summary.denied += 1;
                warn!(code, source = ?decision.source, "Admission denied");
            }
        }

        info!(
            scans = summary.scans,
            allowed = summary.allowed,
            denied = summary.denied,
            "Control loop stopped"
        );
        Ok(summary)
    }

    /// The validator.
    pub fn validator(&self) -> &GateValidator<T> {
        &self.validator
    }
}
