// ── Domain model ──
//
// Per-command running statistics and the aggregate outputs that live
// outside the gauge path. Protocol vocabulary is re-exported from
// obdstream-api so consumers only need this crate.

pub mod outputs;
pub mod stats;

pub use obdstream_api::{
    AdapterIdentity, Batch, CatalogEntry, Command, CommandCategory, ConnectionDetails,
    DecodeResult, FuelLoopStatus, FuelSystemStatus, Measurement, MonitorReadiness, MonitorStatus,
    Protocol, TransportKind, TroubleCode, Unit, UnitSystem,
};
pub use outputs::TroubleCodeState;
pub use stats::SampleStats;
