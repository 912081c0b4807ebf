use thiserror::Error;

use crate::transport::TransportKind;

/// Top-level error type for the `obdstream-api` crate.
///
/// Covers every failure a transport can report: reaching the adapter,
/// the vehicle handshake, and interruptions while streaming.
/// `obdstream-core` maps these into connection state.
#[derive(Debug, Error)]
pub enum Error {
    // ── Adapter ─────────────────────────────────────────────────────
    /// The adapter could not be reached (refused, no route, radio off).
    #[error("Adapter unreachable at {address}: {reason}")]
    Unreachable { address: String, reason: String },

    /// The adapter answered but the vehicle did not.
    #[error("No response from vehicle using protocol {protocol}")]
    NoVehicleResponse { protocol: String },

    /// Handshake did not finish in time.
    #[error("Handshake timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Streaming ───────────────────────────────────────────────────
    /// A request was issued while the transport had no live connection.
    #[error("Transport is not connected")]
    NotConnected,

    /// The polling loop was interrupted by the transport.
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    // ── Configuration ───────────────────────────────────────────────
    /// No transport implementation is available for this kind.
    #[error("Unsupported transport kind: {0}")]
    UnsupportedTransport(TransportKind),

    /// A command name or identifier could not be parsed.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if retrying the same operation might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. }
                | Self::NoVehicleResponse { .. }
                | Self::Timeout { .. }
                | Self::StreamInterrupted(_)
        )
    }
}
