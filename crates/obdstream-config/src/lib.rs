//! Shared configuration for obdstream front ends.
//!
//! TOML profiles describing how to reach an adapter, merged with
//! `OBDSTREAM_*` environment overrides, and translated to
//! `obdstream_core::ControllerConfig`. The CLI layers its flag overrides
//! on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use obdstream_core::{ConnectionDetails, ControllerConfig, Protocol, TransportKind, UnitSystem};

/// Shortest polling interval a profile may ask for.
pub const MIN_STREAM_INTERVAL_MS: u64 = 100;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named adapter profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use: explicit choice, then `default_profile`,
    /// then `"default"`.
    pub fn active_profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    /// Look up a profile. A missing `"default"` profile falls back to the
    /// built-in simulated adapter so a fresh install works out of the box.
    pub fn profile(&self, name: &str) -> Result<Profile, ConfigError> {
        match self.profiles.get(name) {
            Some(profile) => Ok(profile.clone()),
            None if name == "default" => Ok(Profile::default()),
            None => Err(ConfigError::ProfileNotFound { name: name.into() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Connect timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub units: UnitSystem,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            units: UnitSystem::default(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}

/// A named adapter profile.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// How the adapter is reached: "simulated", "wifi" or "bluetooth".
    #[serde(default)]
    pub kind: TransportKind,

    /// Adapter address (ignored by the simulator).
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bus protocol to request, "auto" to let the adapter probe.
    #[serde(default)]
    pub protocol: Protocol,

    /// Override the connect timeout (seconds).
    pub connect_timeout: Option<u64>,

    /// Polling cadence in milliseconds.
    #[serde(default = "default_stream_interval_ms")]
    pub stream_interval_ms: u64,

    /// Override the default unit system.
    pub units: Option<UnitSystem>,

    /// Ask the vehicle which commands it supports while connecting.
    #[serde(default = "default_true")]
    pub query_catalog: bool,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            host: default_host(),
            port: default_port(),
            protocol: Protocol::default(),
            connect_timeout: None,
            stream_interval_ms: default_stream_interval_ms(),
            units: None,
            query_catalog: true,
        }
    }
}

fn default_host() -> String {
    ConnectionDetails::default().host
}
fn default_port() -> u16 {
    ConnectionDetails::default().port
}
fn default_stream_interval_ms() -> u64 {
    1000
}
fn default_true() -> bool {
    true
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "obdstream", "obdstream").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("obdstream");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file + environment.
///
/// Nested keys use a double underscore:
/// `OBDSTREAM_DEFAULTS__TIMEOUT=5`, `OBDSTREAM_PROFILES__CAR__HOST=…`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("OBDSTREAM_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or is broken.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(&path, cfg)?;
    Ok(path)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ControllerConfig` from a profile and the global defaults.
pub fn profile_to_controller_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ControllerConfig, ConfigError> {
    if profile.kind != TransportKind::Simulated && profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: format!("a {} adapter needs a host", profile.kind),
        });
    }
    if profile.port == 0 {
        return Err(ConfigError::Validation {
            field: "port".into(),
            reason: "must be between 1 and 65535".into(),
        });
    }
    if profile.stream_interval_ms < MIN_STREAM_INTERVAL_MS {
        return Err(ConfigError::Validation {
            field: "stream_interval_ms".into(),
            reason: format!(
                "{} is below the minimum of {MIN_STREAM_INTERVAL_MS}",
                profile.stream_interval_ms
            ),
        });
    }

    let timeout_secs = profile.connect_timeout.unwrap_or(defaults.timeout);
    if timeout_secs == 0 {
        return Err(ConfigError::Validation {
            field: "connect_timeout".into(),
            reason: "must be at least one second".into(),
        });
    }

    Ok(ControllerConfig {
        connection: ConnectionDetails {
            kind: profile.kind,
            host: profile.host.clone(),
            port: profile.port,
        },
        protocol: profile.protocol,
        connect_timeout: Duration::from_secs(timeout_secs),
        query_catalog: profile.query_catalog,
        stream_interval: Duration::from_millis(profile.stream_interval_ms),
        units: profile.units.unwrap_or(defaults.units),
    })
}
