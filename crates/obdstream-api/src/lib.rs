// obdstream-api: transport contract and protocol vocabulary for vehicle telemetry.
//
// The wire encoding of the diagnostic protocol lives behind the
// [`Transport`] trait. This crate only defines what a transport must do
// and ships an in-process [`SimulatedTransport`] for demos and tests.

pub mod command;
pub mod decode;
pub mod error;
pub mod simulator;
pub mod transport;

pub use command::{CatalogEntry, Command, CommandCategory};
pub use decode::{
    Batch, DecodeResult, FuelLoopStatus, FuelSystemStatus, Measurement, MonitorReadiness,
    MonitorStatus, TroubleCode, Unit, UnitSystem,
};
pub use error::Error;
pub use simulator::{SimulatedTransport, SimulatorFactory, SimulatorProfile};
pub use transport::{
    AdapterIdentity, BatchStream, ConnectionDetails, Handshake, Protocol, Transport,
    TransportFactory, TransportKind, TransportPhase,
};
