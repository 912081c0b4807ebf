//! Demand aggregation and streaming-session management between
//! `obdstream-api` transports and UI consumers (CLI, dashboards).
//!
//! - **[`InterestRegistry`]**: Consumers register the commands they need
//!   under an [`InterestToken`]; the registry publishes the union of all
//!   demand, distinct-until-changed.
//!
//! - **[`Controller`]**: Owns the transport handle and the
//!   [`ConnectionState`] machine. [`connect()`](Controller::connect)
//!   handshakes and starts streaming exactly the demanded commands the
//!   vehicle supports, restarting the session only when that set changes.
//!
//! - **[`DataStore`]**: Per-command [`SampleStats`] plus the aggregate
//!   outputs (trouble codes, fuel-system status, monitor status), all
//!   cleared whenever a connection ends.
//!
//! - **[`ValueStream<T>`]**: Subscription handle vended by the store and
//!   the registry. Exposes `current()` / `latest()` / `changed()`.

pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod registry;
mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::ControllerConfig;
pub use controller::{ConnectionState, Controller};
pub use error::CoreError;
pub use registry::{InterestRegistry, InterestToken};
pub use store::{DataStore, StatsSnapshot};
pub use stream::{Observable, ValueStream};

pub use model::{
    AdapterIdentity, Batch, CatalogEntry, Command, CommandCategory, ConnectionDetails,
    DecodeResult, FuelLoopStatus, FuelSystemStatus, Measurement, MonitorReadiness, MonitorStatus,
    Protocol, SampleStats, TransportKind, TroubleCode, TroubleCodeState, Unit, UnitSystem,
};
