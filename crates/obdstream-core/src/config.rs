// ── Runtime connection configuration ──
//
// These types describe *how* to reach the adapter and how to poll it.
// They never touch disk. The CLI (via obdstream-config) constructs a
// `ControllerConfig` and hands it in.

use std::time::Duration;

use obdstream_api::{ConnectionDetails, Protocol, UnitSystem};

/// Configuration for one controller.
///
/// Built by the CLI, passed to `Controller` -- core never reads config files.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Adapter location and transport kind.
    pub connection: ConnectionDetails,
    /// Bus protocol to request during the handshake.
    pub protocol: Protocol,
    /// Upper bound for the connect-and-handshake step.
    pub connect_timeout: Duration,
    /// Ask the vehicle which commands it implements while connecting.
    pub query_catalog: bool,
    /// Polling cadence for a streaming session.
    pub stream_interval: Duration,
    /// Initial unit system for numeric streams.
    pub units: UnitSystem,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionDetails::default(),
            protocol: Protocol::Auto,
            connect_timeout: Duration::from_secs(10),
            query_catalog: true,
            stream_interval: Duration::from_secs(1),
            units: UnitSystem::Metric,
        }
    }
}
