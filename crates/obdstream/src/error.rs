//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use obdstream_config::ConfigError;
use obdstream_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not stream from adapter at {address}")]
    #[diagnostic(
        code(obdstream::connection_failed),
        help(
            "{reason}\n\
             Check that the adapter is powered and reachable, and the ignition is on."
        )
    )]
    ConnectionFailed { address: String, reason: String },

    #[error("Adapter handshake timed out after {seconds}s")]
    #[diagnostic(
        code(obdstream::timeout),
        help("Increase the timeout with --timeout or in your profile.")
    )]
    Timeout { seconds: u64 },

    #[error("Transport '{kind}' is not available in this build")]
    #[diagnostic(
        code(obdstream::unsupported_transport),
        help("Use --transport simulated, or set kind = \"simulated\" in your profile.")
    )]
    UnsupportedTransport { kind: String },

    // ── Commands ─────────────────────────────────────────────────────
    #[error("Unknown command '{name}'")]
    #[diagnostic(
        code(obdstream::unknown_command),
        help("Run: obdstream commands to see the catalog, or use category:id (gauge:0x0c).")
    )]
    UnknownCommand { name: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(obdstream::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(obdstream::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: obdstream config init --name {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(obdstream::config_exists),
        help("Pass --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(obdstream::config))]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(obdstream::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(obdstream::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::UnknownCommand { .. }
            | Self::Validation { .. }
            | Self::UnsupportedTransport { .. } => exit_code::USAGE,
            Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::ConfigExists { .. } => exit_code::CONFLICT,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { address, reason } => {
                CliError::ConnectionFailed { address, reason }
            }
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::UnsupportedTransport { kind } => CliError::UnsupportedTransport {
                kind: kind.to_string(),
            },
            CoreError::UnknownCommand { name } => CliError::UnknownCommand { name },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            other @ (CoreError::VehicleUnresponsive { .. }
            | CoreError::ConnectionLost
            | CoreError::StreamInterrupted { .. }) => CliError::ConnectionFailed {
                address: "(adapter)".into(),
                reason: other.to_string(),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound {
                name,
                available: "(none)".into(),
            },
            other => CliError::Config(other),
        }
    }
}
