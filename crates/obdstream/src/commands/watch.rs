//! `watch` handler: register interest, connect, print statistics on change.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;
use tracing::{debug, info};

use obdstream_api::SimulatorFactory;
use obdstream_core::{
    Command, ConnectionState, Controller, FuelSystemStatus, InterestRegistry, MonitorStatus,
    StatsSnapshot, TroubleCodeState, UnitSystem,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

/// Streamed when no commands are named.
const DEFAULT_COMMANDS: [Command; 3] = [
    Command::ENGINE_RPM,
    Command::VEHICLE_SPEED,
    Command::COOLANT_TEMP,
];

// ── View model ───────────────────────────────────────────────────────

/// One rendered update.
#[derive(Debug, Serialize)]
struct WatchSnapshot {
    state: ConnectionState,
    units: UnitSystem,
    stats: Vec<StatItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trouble_codes: Option<TroubleCodeState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fuel_status: Option<FuelSystemStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary_status: Option<MonitorStatus>,
}

#[derive(Debug, Serialize)]
struct StatItem {
    command: String,
    value: f64,
    unit: &'static str,
    min: f64,
    max: f64,
    samples: u64,
    updated_at: DateTime<Utc>,
}

#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Command")]
    command: String,
    #[tabled(rename = "Latest")]
    latest: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
    #[tabled(rename = "Samples")]
    samples: u64,
}

impl From<&StatItem> for StatRow {
    fn from(item: &StatItem) -> Self {
        let fmt = |v: f64| {
            if item.unit.is_empty() {
                format!("{v:.1}")
            } else {
                format!("{v:.1} {}", item.unit)
            }
        };
        Self {
            command: item.command.clone(),
            latest: fmt(item.value),
            min: fmt(item.min),
            max: fmt(item.max),
            samples: item.samples,
        }
    }
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn handle(args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let commands = parse_commands(&args.commands)?;
    let controller_config = config::build_controller_config(global, args)?;
    let address = controller_config.connection.to_string();

    let registry = InterestRegistry::new();
    let controller = Controller::new(
        controller_config,
        registry.clone(),
        Arc::new(SimulatorFactory::default()),
    )?;

    let token = registry.make_token();
    registry.replace(token, commands.iter().copied());
    info!(%token, commands = commands.len(), %address, "watching");

    controller.connect().await;
    let result = stream_updates(&controller, &commands, args.duration, global, &address).await;

    registry.clear(token);
    controller.disconnect().await;
    result
}

/// Parse command names; an empty list means the default gauges.
/// Duplicates are dropped, first occurrence wins the display order.
fn parse_commands(names: &[String]) -> Result<Vec<Command>, CliError> {
    if names.is_empty() {
        return Ok(DEFAULT_COMMANDS.to_vec());
    }
    let mut commands: Vec<Command> = Vec::with_capacity(names.len());
    for name in names {
        let command: Command = name
            .parse()
            .map_err(|_| CliError::UnknownCommand { name: name.clone() })?;
        if !commands.contains(&command) {
            commands.push(command);
        }
    }
    Ok(commands)
}

/// Print a snapshot on every store change until the deadline, Ctrl-C, or
/// the connection fails.
async fn stream_updates(
    controller: &Controller,
    commands: &[Command],
    duration: Option<u64>,
    global: &GlobalOpts,
    address: &str,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let mut state = controller.connection_state();
    let initial = state.borrow_and_update().clone();
    if let ConnectionState::Failed { reason } = initial {
        return Err(CliError::ConnectionFailed {
            address: address.to_owned(),
            reason,
        });
    }
    let mut stats = controller.stats();
    let mut trouble_codes = controller.trouble_codes();
    let mut fuel_status = controller.fuel_status();
    let mut summary_status = controller.summary_status();
    print_snapshot(controller, commands, global, color)?;

    let deadline = async move {
        match duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            () = &mut deadline => {
                debug!("watch duration elapsed");
                break;
            }
            _ = &mut ctrl_c => {
                debug!("interrupted");
                break;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = state.borrow_and_update().clone();
                if let ConnectionState::Failed { reason } = current {
                    return Err(CliError::ConnectionFailed {
                        address: address.to_owned(),
                        reason,
                    });
                }
            }
            Some(_) = stats.changed() => print_snapshot(controller, commands, global, color)?,
            Some(_) = trouble_codes.changed() => print_snapshot(controller, commands, global, color)?,
            Some(_) = fuel_status.changed() => print_snapshot(controller, commands, global, color)?,
            Some(_) = summary_status.changed() => print_snapshot(controller, commands, global, color)?,
        }
    }
    Ok(())
}

fn print_snapshot(
    controller: &Controller,
    commands: &[Command],
    global: &GlobalOpts,
    color: bool,
) -> Result<(), CliError> {
    let store = controller.store();
    let state = controller.connection_state().borrow().clone();
    let snapshot = build_snapshot(
        state,
        controller.unit_system(),
        commands,
        &store.stats_snapshot(),
        store.trouble_codes_snapshot(),
        store.fuel_status_snapshot(),
        store.summary_status_snapshot(),
    );
    let out = match global.output {
        OutputFormat::Table => render_detail(&snapshot, color),
        // One document per update, so the stream stays line-delimited.
        OutputFormat::Json => output::render_single(
            OutputFormat::JsonCompact,
            &snapshot,
            |_| String::new(),
            |_| String::new(),
        )?,
        format => output::render_single(format, &snapshot, |_| String::new(), render_plain)?,
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Rendering ────────────────────────────────────────────────────────

fn build_snapshot(
    state: ConnectionState,
    units: UnitSystem,
    commands: &[Command],
    stats: &StatsSnapshot,
    trouble_codes: TroubleCodeState,
    fuel_status: Option<FuelSystemStatus>,
    summary_status: Option<MonitorStatus>,
) -> WatchSnapshot {
    let stats = commands
        .iter()
        .filter_map(|cmd| {
            stats.get(cmd).map(|s| StatItem {
                command: cmd.to_string(),
                value: s.latest.value,
                unit: s.latest.unit.symbol(),
                min: s.min,
                max: s.max,
                samples: s.sample_count,
                updated_at: s.updated_at,
            })
        })
        .collect();

    WatchSnapshot {
        state,
        units,
        stats,
        trouble_codes: commands
            .contains(&Command::STORED_TROUBLE_CODES)
            .then_some(trouble_codes),
        fuel_status,
        summary_status,
    }
}

fn render_detail(snapshot: &WatchSnapshot, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({})",
        output::heading(&snapshot.state.to_string(), color),
        snapshot.units
    );

    if !snapshot.stats.is_empty() {
        let rows: Vec<StatRow> = snapshot.stats.iter().map(StatRow::from).collect();
        let _ = writeln!(out, "{}", output::render_table(&rows));
    }

    if let Some(ref codes) = snapshot.trouble_codes {
        match codes.codes() {
            None => {
                let _ = writeln!(out, "Trouble codes: waiting");
            }
            Some([]) => {
                let _ = writeln!(out, "Trouble codes: none");
            }
            Some(list) => {
                let _ = writeln!(out, "{}", output::alert("Trouble codes:", color));
                for code in list {
                    match code.description {
                        Some(ref desc) => {
                            let _ = writeln!(out, "  {} {desc}", code.code);
                        }
                        None => {
                            let _ = writeln!(out, "  {}", code.code);
                        }
                    }
                }
            }
        }
    }

    if let Some(fuel) = snapshot.fuel_status {
        let _ = match fuel.bank2 {
            Some(bank2) => writeln!(out, "Fuel system: bank 1 {}, bank 2 {bank2}", fuel.bank1),
            None => writeln!(out, "Fuel system: bank 1 {}", fuel.bank1),
        };
    }

    if let Some(ref status) = snapshot.summary_status {
        let mil = if status.mil_on {
            output::alert("MIL on", color)
        } else {
            "MIL off".to_owned()
        };
        let ready = status
            .monitors
            .iter()
            .filter(|m| m.available && m.complete)
            .count();
        let available = status.monitors.iter().filter(|m| m.available).count();
        let _ = writeln!(
            out,
            "Status: {mil}, {} stored code(s), monitors ready {ready}/{available}",
            status.trouble_code_count
        );
    }

    out.trim_end().to_owned()
}

fn render_plain(snapshot: &WatchSnapshot) -> String {
    snapshot
        .stats
        .iter()
        .map(|item| format!("{}={:.1}", item.command, item.value))
        .collect::<Vec<_>>()
        .join("\n")
}
