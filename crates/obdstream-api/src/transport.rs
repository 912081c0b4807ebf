// Transport contract shared by every adapter implementation.
//
// The core never talks to a socket or a serial port directly; it holds an
// `Arc<dyn Transport>` built by a `TransportFactory` from the current
// `ConnectionDetails`, and swaps the whole handle when those change.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::command::Command;
use crate::decode::{Batch, UnitSystem};
use crate::error::Error;

/// How the adapter is physically reached.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TransportKind {
    /// In-process simulated vehicle.
    #[default]
    Simulated,
    /// Wi-Fi adapter reached over TCP.
    Wifi,
    /// Bluetooth LE adapter.
    Bluetooth,
}

/// Where to find the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDetails {
    pub kind: TransportKind,
    pub host: String,
    pub port: u16,
}

impl Default for ConnectionDetails {
    fn default() -> Self {
        Self {
            kind: TransportKind::Simulated,
            host: "192.168.0.10".into(),
            port: 35000,
        }
    }
}

impl fmt::Display for ConnectionDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.kind, self.host, self.port)
    }
}

/// Bus protocol to negotiate with the vehicle.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Protocol {
    /// Let the adapter probe for the protocol.
    #[default]
    Auto,
    Can11bit500k,
    Can29bit500k,
    Can11bit250k,
    Can29bit250k,
    Iso9141,
    Kwp2000,
}

/// Who answered the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterIdentity {
    /// Adapter firmware banner (e.g. `ELM327 v1.5`).
    pub adapter: String,
    /// Protocol the vehicle answered on.
    pub protocol: Protocol,
    pub vin: Option<String>,
}

/// Result of a successful connect-and-handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Commands the vehicle reported as implemented.
    pub supported: HashSet<Command>,
    pub identity: AdapterIdentity,
}

/// Fine-grained connection phase published by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransportPhase {
    #[default]
    Disconnected,
    ConnectingToAdapter,
    ConnectedToAdapter,
    ConnectingToVehicle,
    ConnectedToVehicle,
    Error(String),
}

/// Stream of decoded batches. Dropping it cancels the polling loop.
pub type BatchStream = BoxStream<'static, Result<Batch, Error>>;

/// An adapter connection able to poll a set of commands on an interval.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Reach the adapter, negotiate a protocol with the vehicle and, when
    /// `query_catalog` is set, ask which commands the vehicle implements.
    async fn connect(
        &self,
        protocol: Protocol,
        timeout: Duration,
        query_catalog: bool,
    ) -> Result<Handshake, Error>;

    /// Start polling exactly `commands` every `interval`.
    ///
    /// Batches are delivered until the returned stream is dropped or the
    /// connection goes away.
    fn start_stream(
        &self,
        commands: HashSet<Command>,
        units: UnitSystem,
        interval: Duration,
    ) -> BatchStream;

    /// Tear down the adapter connection. Idempotent.
    fn stop(&self);

    /// Subscribe to the transport's own connection phases.
    fn phase(&self) -> watch::Receiver<TransportPhase>;
}

/// Builds transports from connection details.
pub trait TransportFactory: Send + Sync {
    fn create(&self, details: &ConnectionDetails) -> Result<Arc<dyn Transport>, Error>;
}
