//! qrgate error types.

use thiserror::Error;

/// Errors that can occur while validating tickets or driving the gate.
#[derive(Debug, Error)]
pub enum GateError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP transport error (connection, timeout, body read).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The API kept rejecting our credential after the one allowed refresh.
    #[error("Authorization rejected (HTTP {status})")]
    AuthRejected {
        /// Final HTTP status code.
        status: u16,
    },

    /// The API answered with a non-success status other than an expired token.
    #[error("Unexpected HTTP status {status}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
    },

    /// The refresh endpoint did not hand out a new access token.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// Failed to parse an API response envelope.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The gate actuator is unavailable or a write to it failed.
    #[error("Hardware error: {0}")]
    HardwareError(String),

    /// Snapshot file I/O error.
    #[error("Snapshot I/O error: {0}")]
    SnapshotIO(String),

    /// Reading scanner input failed.
    #[error("Input error: {0}")]
    InputError(String),
}
