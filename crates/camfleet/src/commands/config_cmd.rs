//! Config subcommand handlers.

use std::path::PathBuf;

use dialoguer::{Confirm, Input, Select};
use secrecy::SecretString;

use camfleet_config::{Desired, Policy};
use camfleet_core::STRICT_RATIO_TOLERANCE;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display as TOML-ish text.
fn format_config(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    match &cfg.inventory {
        Some(path) => {
            let _ = writeln!(out, "inventory = \"{}\"", path.display());
        }
        None => {
            let _ = writeln!(out, "# inventory not set");
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "probe_timeout = {}", cfg.defaults.probe_timeout);
    let _ = writeln!(out, "ffprobe = \"{}\"", cfg.defaults.ffprobe.display());

    let p = &cfg.policy;
    let _ = writeln!(out);
    let _ = writeln!(out, "[policy]");
    let _ = writeln!(out, "ratio_tolerance = {}", p.ratio_tolerance);
    let _ = writeln!(out, "bitrate_tolerance = {}", p.bitrate_tolerance);
    let _ = writeln!(out, "frame_rate_policy = \"{}\"", p.frame_rate_policy);
    let _ = writeln!(out, "settle_delay_ms = {}", p.settle_delay_ms);
    let _ = writeln!(out, "concurrency = {}", p.concurrency);
    if let Some(secs) = p.batch_timeout_secs {
        let _ = writeln!(out, "batch_timeout_secs = {secs}");
    }
    let _ = writeln!(out, "fallback_enabled = {}", p.fallback_enabled);
    let _ = writeln!(out, "fallback_frame_rate = {}", p.fallback_frame_rate);

    if let Some(d) = &cfg.desired {
        let _ = writeln!(out);
        let _ = writeln!(out, "[desired]");
        let _ = writeln!(out, "width = {}", d.width);
        let _ = writeln!(out, "height = {}", d.height);
        if let Some(fps) = d.fps {
            let _ = writeln!(out, "fps = {fps}");
        }
        if let Some(bitrate) = d.bitrate {
            let _ = writeln!(out, "bitrate = {bitrate}");
        }
        if let Some(ref encoding) = d.encoding {
            let _ = writeln!(out, "encoding = \"{encoding}\"");
        }
    }

    out
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Prompt for a saved desired configuration.
fn prompt_desired() -> Result<Desired, CliError> {
    let width: u32 = Input::new()
        .with_prompt("Width")
        .default(1920)
        .interact_text()
        .map_err(prompt_err)?;
    let height: u32 = Input::new()
        .with_prompt("Height")
        .default(1080)
        .interact_text()
        .map_err(prompt_err)?;
    let fps: u32 = Input::new()
        .with_prompt("Frame rate (0 = keep camera's)")
        .default(0)
        .interact_text()
        .map_err(prompt_err)?;
    let bitrate: u32 = Input::new()
        .with_prompt("Bitrate kbps (0 = keep camera's)")
        .default(0)
        .interact_text()
        .map_err(prompt_err)?;

    Ok(Desired {
        width,
        height,
        fps: (fps > 0).then_some(fps),
        bitrate: (bitrate > 0).then_some(bitrate),
        encoding: None,
    })
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config_path = config::config_file(global);

    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            eprintln!("camfleet configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            // 1. Inventory
            let inventory: String = Input::new()
                .with_prompt("Camera inventory CSV")
                .default("cameras.csv".into())
                .interact_text()
                .map_err(prompt_err)?;
            let inventory = std::path::absolute(PathBuf::from(inventory))?;

            // 2. Resolution matching
            let choices = &[
                "Loose: prefer the same shape, accept any close size",
                "Strict: only nearly identical aspect ratios count as the same shape",
            ];
            let strictness = Select::new()
                .with_prompt("Resolution matching")
                .items(choices)
                .default(0)
                .interact()
                .map_err(prompt_err)?;
            let mut policy = Policy::default();
            if strictness == 1 {
                policy.ratio_tolerance = STRICT_RATIO_TOLERANCE;
            }

            // 3. Parallelism
            policy.concurrency = Input::new()
                .with_prompt("Cameras processed in parallel")
                .default(policy.concurrency)
                .interact_text()
                .map_err(prompt_err)?;

            // 4. Saved desired configuration
            let save_desired = Confirm::new()
                .with_prompt("Save a default encoder configuration?")
                .default(false)
                .interact()
                .map_err(prompt_err)?;
            let desired = if save_desired {
                Some(prompt_desired()?)
            } else {
                None
            };

            let cfg = Config {
                inventory: Some(inventory),
                policy,
                desired,
                ..Config::default()
            };
            camfleet_config::save_config_to(&cfg, &config_path)?;

            eprintln!("\n✓ Configuration written to {}", config_path.display());
            eprintln!("\n  Test it: camfleet devices list");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let out = output::render_single(
                config::output_format(global, &cfg),
                &cfg,
                format_config,
                |_| config_path.display().to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            println!("{}", config_path.display());
            Ok(())
        }

        // ── SetPassword ─────────────────────────────────────────────
        ConfigCommand::SetPassword { id } => {
            let cfg = config::load(global)?;
            // Only check the id when an inventory is reachable.
            if let Ok(records) = config::inventory(global, &cfg) {
                if !records.iter().any(|r| r.id == id) {
                    return Err(CliError::NotFound {
                        resource_type: "camera".into(),
                        identifier: id,
                        list_command: "devices list".into(),
                    });
                }
            }

            let secret = rpassword::prompt_password(format!("Password for camera {id}: "))
                .map_err(prompt_err)?;
            if secret.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "password cannot be empty".into(),
                });
            }
            camfleet_config::store_password(&id, &SecretString::from(secret))?;
            eprintln!("✓ Password for camera '{id}' stored in system keyring");
            Ok(())
        }

        // ── Import: desired configuration from CSV ──────────────────
        ConfigCommand::Import { path } => {
            let desired = camfleet_config::load_desired_csv(&path)?;
            let mut cfg = config::load(global)?;
            tracing::debug!(path = %path.display(), ?desired, "imported desired configuration");
            cfg.desired = Some(desired);
            camfleet_config::save_config_to(&cfg, &config_path)?;
            eprintln!("✓ Desired configuration saved to {}", config_path.display());
            Ok(())
        }
    }
}
