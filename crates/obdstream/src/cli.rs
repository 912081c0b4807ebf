//! Clap derive structures for the `obdstream` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

use obdstream_core::{TransportKind, UnitSystem};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// obdstream -- live vehicle telemetry from an OBD-II adapter
#[derive(Debug, Parser)]
#[command(
    name = "obdstream",
    version,
    about = "Stream live vehicle telemetry from an OBD-II adapter",
    long_about = "Connects to a diagnostic adapter, polls exactly the commands you ask for,\n\
        and prints running statistics (latest, min, max, sample count) as they change.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Adapter profile to use
    #[arg(long, short = 'p', env = "OBDSTREAM_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Transport kind (overrides profile)
    #[arg(long, env = "OBDSTREAM_TRANSPORT", global = true)]
    pub transport: Option<TransportKind>,

    /// Adapter host (overrides profile)
    #[arg(long, env = "OBDSTREAM_HOST", global = true)]
    pub host: Option<String>,

    /// Adapter port (overrides profile)
    #[arg(long, env = "OBDSTREAM_PORT", global = true)]
    pub port: Option<u16>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "OBDSTREAM_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Handshake timeout in seconds (overrides profile)
    #[arg(long, env = "OBDSTREAM_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON, one document per update
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream the given commands and print statistics as they change
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// List the built-in command catalog
    #[command(alias = "cmds")]
    Commands,

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Commands to stream, by catalog name (`rpm`) or `category:id`
    /// (`vendor-extended:0x1940`). Defaults to rpm, speed and coolant-temp.
    pub commands: Vec<String>,

    /// Stop after this many seconds (runs until Ctrl-C when omitted)
    #[arg(long, short = 'd')]
    pub duration: Option<u64>,

    /// Unit system for numeric values (overrides profile)
    #[arg(long, short = 'u')]
    pub units: Option<UnitSystem>,

    /// Polling interval in milliseconds (overrides profile)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a config file with a profile built from the global flags
    Init {
        /// Name of the profile to create
        #[arg(long, default_value = "default")]
        name: String,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
