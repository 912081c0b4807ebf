//! Profile resolution: config file + environment, then CLI flag overrides.
//!
//! This is the single boundary where CLI flags cross into core types.

use obdstream_config::{Config, Profile};
use obdstream_core::ControllerConfig;

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;

pub use obdstream_config::{config_path, load_config_or_default, save_config};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.active_profile_name(global.profile.as_deref())
}

/// Look up the active profile and fold the global flags over it.
pub fn resolve_profile(global: &GlobalOpts, config: &Config) -> Result<Profile, CliError> {
    let name = active_profile_name(global, config);
    let mut profile = config.profile(&name).map_err(|_| CliError::ProfileNotFound {
        available: available_profiles(config),
        name,
    })?;

    if let Some(kind) = global.transport {
        profile.kind = kind;
    }
    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(port) = global.port {
        profile.port = port;
    }
    if let Some(timeout) = global.timeout {
        profile.connect_timeout = Some(timeout);
    }
    Ok(profile)
}

/// Build the controller configuration for `watch`.
pub fn build_controller_config(
    global: &GlobalOpts,
    args: &WatchArgs,
) -> Result<ControllerConfig, CliError> {
    let cfg = load_config_or_default();
    let mut profile = resolve_profile(global, &cfg)?;

    if let Some(interval) = args.interval {
        profile.stream_interval_ms = interval;
    }
    if let Some(units) = args.units {
        profile.units = Some(units);
    }

    Ok(obdstream_config::profile_to_controller_config(
        &profile,
        &cfg.defaults,
    )?)
}

fn available_profiles(config: &Config) -> String {
    let mut names: Vec<&str> = config.profiles.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}
