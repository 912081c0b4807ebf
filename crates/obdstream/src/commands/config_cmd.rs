//! Config subcommand handlers.

use obdstream_config::{Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: write a profile from the global flags ─────────────
        ConfigCommand::Init { name, force } => {
            let path = config::config_path();
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }

            let mut profile = Profile::default();
            if let Some(kind) = global.transport {
                profile.kind = kind;
            }
            if let Some(ref host) = global.host {
                profile.host.clone_from(host);
            }
            if let Some(port) = global.port {
                profile.port = port;
            }
            profile.connect_timeout = global.timeout;

            // Reject a profile `watch` could not use before writing it.
            let mut cfg = Config::default();
            obdstream_config::profile_to_controller_config(&profile, &cfg.defaults)?;

            cfg.default_profile = Some(name.clone());
            cfg.profiles.insert(name.clone(), profile);
            let written = config::save_config(&cfg)?;

            tracing::info!(profile = %name, path = %written.display(), "config written");
            if !global.quiet {
                eprintln!("Wrote profile '{name}' to {}", written.display());
            }
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let out = output::render_single(
                global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|_| format!("{c:#?}")),
                |c| config::active_profile_name(global, c),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }
    }
}
