//! CLI configuration: thin wrapper around `camfleet_config`.
//!
//! Adds the resolution steps that respect `GlobalOpts` flag overrides
//! (--config, --inventory, --output, --timeout).

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use camfleet_config::{CameraRecord, ConfigError, Desired};
use camfleet_core::{EncoderConfig, EngineConfig};

use crate::cli::{ColorMode, DesiredArgs, GlobalOpts, OutputFormat, TargetArgs};
use crate::error::CliError;

pub use camfleet_config::Config;

/// The config file in effect: `--config`, else the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(camfleet_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(camfleet_config::load_config_from(&config_file(global))?)
}

/// Flag > config `[defaults].output` > table.
pub fn output_format(global: &GlobalOpts, cfg: &Config) -> OutputFormat {
    global
        .output
        .or_else(|| OutputFormat::from_str(&cfg.defaults.output, true).ok())
        .unwrap_or(OutputFormat::Table)
}

pub fn color_mode(global: &GlobalOpts, cfg: &Config) -> ColorMode {
    global
        .color
        .or_else(|| ColorMode::from_str(&cfg.defaults.color, true).ok())
        .unwrap_or(ColorMode::Auto)
}

/// Load the inventory named by `--inventory` or the config file.
pub fn inventory(global: &GlobalOpts, cfg: &Config) -> Result<Vec<CameraRecord>, CliError> {
    let path = global
        .inventory
        .as_ref()
        .or(cfg.inventory.as_ref())
        .ok_or(ConfigError::NoInventory)?;
    tracing::debug!(path = %path.display(), "loading inventory");
    Ok(camfleet_config::load_inventory(path)?)
}

/// Engine configuration from the file, with `--timeout` applied.
pub fn engine_config(global: &GlobalOpts, cfg: &Config) -> Result<EngineConfig, CliError> {
    let mut engine = camfleet_config::to_engine_config(cfg)?;
    if let Some(secs) = global.timeout {
        if secs == 0 {
            return Err(CliError::Validation {
                field: "--timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        engine.request_timeout = Duration::from_secs(secs);
    }
    Ok(engine)
}

/// The requested configuration: flags when a size is given, else the
/// `[desired]` table.
pub fn desired(args: &DesiredArgs, cfg: &Config) -> Result<EncoderConfig, CliError> {
    let desired = match (args.width, args.height) {
        (Some(width), Some(height)) => Desired {
            width,
            height,
            fps: args.fps,
            bitrate: args.bitrate,
            encoding: args.encoding.clone(),
        },
        _ => {
            let mut saved = cfg.desired.clone().ok_or_else(|| CliError::Validation {
                field: "desired".into(),
                reason: "pass --width and --height, or save [desired] in the config file".into(),
            })?;
            saved.fps = args.fps.or(saved.fps);
            saved.bitrate = args.bitrate.or(saved.bitrate);
            saved.encoding = args.encoding.clone().or(saved.encoding);
            saved
        }
    };
    Ok(camfleet_config::desired_from(&desired)?)
}

/// Camera ids a batch targets, in the order given. `--all` takes the
/// inventory order.
pub fn target_ids(targets: &TargetArgs, records: &[CameraRecord]) -> Result<Vec<String>, CliError> {
    if targets.all {
        return Ok(records.iter().map(|r| r.id.clone()).collect());
    }
    let ids: Vec<String> = targets
        .ids
        .iter()
        .map(|id| id.trim().to_owned())
        .filter(|id| !id.is_empty())
        .collect();
    if ids.is_empty() {
        return Err(CliError::Validation {
            field: "--ids".into(),
            reason: "no camera ids given".into(),
        });
    }
    Ok(ids)
}
