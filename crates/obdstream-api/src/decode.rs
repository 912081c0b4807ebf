// ── Decoded payloads ──
//
// What a transport hands back for each requested command once the raw
// response has been decoded. One polling cycle yields a `Batch`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::command::Command;

/// One delivery cycle: every command the transport got an answer for.
pub type Batch = HashMap<Command, DecodeResult>;

/// Measurement system numeric streams are requested in.
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
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

/// Unit attached to a decoded numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Rpm,
    KilometersPerHour,
    MilesPerHour,
    Celsius,
    Fahrenheit,
    Percent,
    GramsPerSecond,
    PoundsPerMinute,
    Volts,
    Dimensionless,
}

impl Unit {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Rpm => "rpm",
            Self::KilometersPerHour => "km/h",
            Self::MilesPerHour => "mph",
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
            Self::Percent => "%",
            Self::GramsPerSecond => "g/s",
            Self::PoundsPerMinute => "lb/min",
            Self::Volts => "V",
            Self::Dimensionless => "",
        }
    }
}

/// A numeric sample with its unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub unit: Unit,
}

impl Measurement {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }
}

/// A stored diagnostic trouble code (e.g. `P0301`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TroubleCode {
    pub code: String,
    pub description: Option<String>,
}

impl TroubleCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: None,
        }
    }
}

/// Closed/open loop state of one fuel bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FuelLoopStatus {
    OpenLoopCold,
    ClosedLoop,
    OpenLoopLoad,
    OpenLoopFailure,
    ClosedLoopFault,
}

/// Fuel-system status record; bank 2 is absent on single-bank engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuelSystemStatus {
    pub bank1: FuelLoopStatus,
    pub bank2: Option<FuelLoopStatus>,
}

/// Readiness of one on-board monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorReadiness {
    pub name: String,
    pub available: bool,
    pub complete: bool,
}

/// Malfunction indicator lamp plus monitor readiness summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub mil_on: bool,
    pub trouble_code_count: u8,
    pub monitors: Vec<MonitorReadiness>,
}

/// Decoded answer for one command in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum DecodeResult {
    Measurement(Measurement),
    StatusBundle(FuelSystemStatus),
    TroubleCodes(Vec<TroubleCode>),
    SummaryStatus(MonitorStatus),
    /// The device answered but no decodable payload came back.
    NoData,
}
