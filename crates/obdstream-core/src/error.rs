// ── Core error types ──
//
// User-facing errors from obdstream-core. Consumers never see raw
// transport failures from `connect()`; those end up as
// `ConnectionState::Failed` carrying this type's display string.
// The `From<obdstream_api::Error>` impl translates transport-layer
// errors into domain-appropriate variants.

use thiserror::Error;

use obdstream_api::TransportKind;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach adapter at {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Vehicle did not respond ({protocol})")]
    VehicleUnresponsive { protocol: String },

    #[error("Adapter handshake timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Adapter connection lost")]
    ConnectionLost,

    #[error("Telemetry stream interrupted: {message}")]
    StreamInterrupted { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Transport kind '{kind}' is not available in this build")]
    UnsupportedTransport { kind: TransportKind },

    #[error("Unknown command: {name}")]
    UnknownCommand { name: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<obdstream_api::Error> for CoreError {
    fn from(err: obdstream_api::Error) -> Self {
        match err {
            obdstream_api::Error::Unreachable { address, reason } => {
                CoreError::ConnectionFailed { address, reason }
            }
            obdstream_api::Error::NoVehicleResponse { protocol } => {
                CoreError::VehicleUnresponsive { protocol }
            }
            obdstream_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            obdstream_api::Error::NotConnected => CoreError::ConnectionLost,
            obdstream_api::Error::StreamInterrupted(message) => {
                CoreError::StreamInterrupted { message }
            }
            obdstream_api::Error::UnsupportedTransport(kind) => {
                CoreError::UnsupportedTransport { kind }
            }
            obdstream_api::Error::UnknownCommand(name) => CoreError::UnknownCommand { name },
            obdstream_api::Error::Io(e) => CoreError::ConnectionFailed {
                address: String::new(),
                reason: e.to_string(),
            },
        }
    }
}
