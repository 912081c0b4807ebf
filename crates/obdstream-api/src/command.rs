// ── Command identity ──
//
// A Command names one addressable metric or request on the diagnostic
// bus. Identity is category + sub-identifier, nothing else.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Family a [`Command`] belongs to.
///
/// Only [`Gauge`](Self::Gauge) commands are checked against the vehicle's
/// supported set; the other families are requested unconditionally.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CommandCategory {
    /// Numeric live-data parameter (RPM, speed, temperatures, ...).
    Gauge,
    /// Bitfield record decoded into a structured status.
    StatusBundle,
    /// Request for stored diagnostic trouble codes.
    TroubleCodeRequest,
    /// Manufacturer-specific extended parameter.
    VendorExtended,
}

/// Immutable identifier for one metric or request type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Command {
    category: CommandCategory,
    id: u16,
}

/// One row of the built-in command catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub command: Command,
    pub name: &'static str,
    pub description: &'static str,
}

impl Command {
    pub const ENGINE_LOAD: Self = Self::gauge(0x04);
    pub const COOLANT_TEMP: Self = Self::gauge(0x05);
    pub const ENGINE_RPM: Self = Self::gauge(0x0C);
    pub const VEHICLE_SPEED: Self = Self::gauge(0x0D);
    pub const INTAKE_AIR_TEMP: Self = Self::gauge(0x0F);
    pub const MAF_RATE: Self = Self::gauge(0x10);
    pub const THROTTLE_POSITION: Self = Self::gauge(0x11);
    pub const FUEL_LEVEL: Self = Self::gauge(0x2F);
    pub const CONTROL_MODULE_VOLTAGE: Self = Self::gauge(0x42);

    pub const MONITOR_STATUS: Self = Self::new(CommandCategory::StatusBundle, 0x01);
    pub const FUEL_SYSTEM_STATUS: Self = Self::new(CommandCategory::StatusBundle, 0x03);

    pub const STORED_TROUBLE_CODES: Self = Self::new(CommandCategory::TroubleCodeRequest, 0x03);

    pub const fn new(category: CommandCategory, id: u16) -> Self {
        Self { category, id }
    }

    pub const fn gauge(id: u16) -> Self {
        Self::new(CommandCategory::Gauge, id)
    }

    pub const fn category(&self) -> CommandCategory {
        self.category
    }

    pub const fn id(&self) -> u16 {
        self.id
    }

    pub fn is_gauge(&self) -> bool {
        self.category == CommandCategory::Gauge
    }

    /// Short catalog name, if this command is a well-known one.
    pub fn name(&self) -> Option<&'static str> {
        Self::catalog()
            .iter()
            .find(|entry| entry.command == *self)
            .map(|entry| entry.name)
    }

    /// Every command the crate knows by name.
    pub fn catalog() -> &'static [CatalogEntry] {
        CATALOG
    }
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        command: Command::ENGINE_RPM,
        name: "rpm",
        description: "Engine speed",
    },
    CatalogEntry {
        command: Command::VEHICLE_SPEED,
        name: "speed",
        description: "Vehicle speed",
    },
    CatalogEntry {
        command: Command::COOLANT_TEMP,
        name: "coolant-temp",
        description: "Engine coolant temperature",
    },
    CatalogEntry {
        command: Command::ENGINE_LOAD,
        name: "engine-load",
        description: "Calculated engine load",
    },
    CatalogEntry {
        command: Command::THROTTLE_POSITION,
        name: "throttle",
        description: "Absolute throttle position",
    },
    CatalogEntry {
        command: Command::INTAKE_AIR_TEMP,
        name: "intake-temp",
        description: "Intake air temperature",
    },
    CatalogEntry {
        command: Command::MAF_RATE,
        name: "maf",
        description: "Mass air flow rate",
    },
    CatalogEntry {
        command: Command::FUEL_LEVEL,
        name: "fuel-level",
        description: "Fuel tank level input",
    },
    CatalogEntry {
        command: Command::CONTROL_MODULE_VOLTAGE,
        name: "voltage",
        description: "Control module voltage",
    },
    CatalogEntry {
        command: Command::MONITOR_STATUS,
        name: "status",
        description: "Malfunction indicator and monitor readiness",
    },
    CatalogEntry {
        command: Command::FUEL_SYSTEM_STATUS,
        name: "fuel-status",
        description: "Fuel system loop status per bank",
    },
    CatalogEntry {
        command: Command::STORED_TROUBLE_CODES,
        name: "dtc",
        description: "Stored diagnostic trouble codes",
    },
];

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}:{:#04x}", self.category, self.id),
        }
    }
}

/// Parses either a catalog name (`rpm`) or `category:id` where the id is
/// decimal or `0x`-prefixed hex (`vendor-extended:0x1940`).
impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        if let Some(entry) = CATALOG.iter().find(|entry| entry.name == needle) {
            return Ok(entry.command);
        }

        let unknown = || Error::UnknownCommand(s.to_owned());
        let (category, id) = needle.split_once(':').ok_or_else(unknown)?;
        let category = CommandCategory::from_str(category).map_err(|_| unknown())?;
        let id = match id.strip_prefix("0x") {
            Some(hex) => u16::from_str_radix(hex, 16),
            None => id.parse::<u16>(),
        }
        .map_err(|_| unknown())?;

        Ok(Self::new(category, id))
    }
}
