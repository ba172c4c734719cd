//! # qrgate
//!
//! **QR ticket validation and turnstile control for venue entrances.**
//!
//! qrgate keeps a local set of valid ticket ids, synchronized from a paged
//! check-in API, and opens a turnstile when a scanned code is in that set.
//!
//! ## Features
//!
//! - **Bearer session with reactive refresh**: an expired token (HTTP 401)
//!   is refreshed once and the request retried once
//! - **Full sync at startup**: every page is fetched before the first scan
//!   is accepted, and the result is written to a JSON snapshot
//! - **Tail resync on miss**: an unknown code triggers a fetch of only the
//!   last few pages, where fresh check-ins land
//! - **Fail-closed**: any network or auth failure during a lookup denies
//! - **Guaranteed gate reset**: the output is driven low on every exit path
//!
//! ## Quickstart
//!
//! ```no_run
//! use qrgate::{shutdown, ActuatorKind, ControlLoop, GateConfig, LineScanner};
//!
//! fn main() -> Result<(), qrgate::GateError> {
//!     let config = GateConfig::new(
//!         "https://api.example.com/checkins",
//!         "INITIAL_TOKEN",
//!         "https://api.example.com/refresh-token",
//!         "REFRESH_TOKEN",
//!     );
//!
//!     // Acquire hardware first: a gate that cannot open must not start.
//!     let actuator = ActuatorKind::Gpio { pin: 17 }.build()?;
//!     let mut control = ControlLoop::new(config, actuator)?;
//!
//!     let (_trigger, signal) = shutdown::channel();
//!     let summary = control.run(&mut LineScanner::stdin(), &signal)?;
//!     println!("{} admitted, {} denied", summary.allowed, summary.denied);
//!     Ok(())
//! }
//! ```
//!
//! ## Threading
//!
//! Everything runs on the calling thread and blocks: one scan is validated
//! and actuated before the next is read. The stdin reader and the signal
//! listener are the only helpers, and neither touches gate state.

#![deny(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Protocol layer
pub mod protocol;

// Client layer
pub mod client;

// Cache layer
pub mod cache;

// Gate layer
pub mod gate;

// Process plumbing
pub mod input;
pub mod shutdown;

// Re-exports for public API
pub use cache::admission::AdmissionCache;
pub use client::http::{HttpResponse, HttpTransport, ReqwestTransport};
pub use client::pager::PaginatedApiClient;
pub use client::session::CredentialSession;
pub use clock::{Clock, SystemClock};
pub use config::GateConfig;
pub use errors::GateError;
pub use gate::actuator::{ActuatorKind, GateActuator, GpioActuator, NullActuator};
pub use gate::control::{ControlLoop, RunSummary};
pub use gate::validator::{DecisionSource, GateDecision, GateValidator, SyncReport};
pub use input::{LineScanner, ScanEvent, ScanSource};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
