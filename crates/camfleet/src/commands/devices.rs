//! Device command handlers.

use std::fmt::Write as _;
use std::sync::Arc;

use tabled::Tabled;

use camfleet_api::TransportConfig;
use camfleet_config::CameraRecord;
use camfleet_core::export::compare_ids;
use camfleet_core::model::redact_url;
use camfleet_core::{
    ConfigApplier, DeviceCheck, DeviceClientRegistry, EncoderConfig, OnvifClientFactory,
    Reachability, ValueRange,
};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "User")]
    username: String,
    #[tabled(rename = "Password")]
    password: String,
    #[tabled(rename = "Simulated")]
    simulated: String,
}

impl From<&CameraRecord> for DeviceRow {
    fn from(r: &CameraRecord) -> Self {
        let password = if r.password_env.is_some() {
            "env"
        } else if r.password.is_some() {
            "inventory"
        } else {
            "keyring"
        };
        Self {
            id: r.id.clone(),
            address: format!("{}:{}", r.ip, r.port),
            username: r.username.clone(),
            password: password.into(),
            simulated: if r.is_fake { "yes" } else { "" }.into(),
        }
    }
}

// ── Check detail ────────────────────────────────────────────────────

#[derive(Tabled)]
struct ResolutionRow {
    #[tabled(rename = "Width")]
    width: u32,
    #[tabled(rename = "Height")]
    height: u32,
    #[tabled(rename = "Current")]
    current: String,
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}

fn range(r: Option<ValueRange>) -> String {
    r.map_or_else(|| "-".into(), |r| format!("{}-{}", r.min, r.max))
}

fn settings(cfg: &EncoderConfig) -> String {
    let mut out = format!("{} @ {} fps, {} kbps", cfg.resolution, cfg.frame_rate, cfg.bitrate_kbps);
    if let Some(encoding) = cfg.encoding {
        let _ = write!(out, ", {encoding}");
    }
    if cfg.quality > 0 {
        let _ = write!(out, ", quality {}", cfg.quality);
    }
    out
}

fn check_detail(c: &DeviceCheck, color: bool) -> String {
    let status = if color {
        output::status_label(c.status)
    } else {
        c.status.to_string()
    };
    let mut lines = vec![
        format!("ID:        {}", c.device_id),
        format!("Address:   {}", c.address),
        format!("Status:    {status}"),
    ];
    if c.simulated {
        lines.push("Simulated: yes".into());
    }
    if c.protocol.is_some() {
        lines.push(format!("Protocol:  {}", or_dash(c.protocol)));
        lines.push(format!("Profile:   {}", or_dash(c.profile_token.as_deref())));
        lines.push(format!("Encoder:   {}", or_dash(c.config_token.as_deref())));
        lines.push(format!("Current:   {}", or_dash(c.current.as_ref().map(settings))));
        lines.push(format!(
            "Stream:    {}",
            or_dash(c.stream_url.as_deref().map(redact_url))
        ));
    }
    if let Some(caps) = &c.capabilities {
        lines.push(format!("Codec:     {}", or_dash(caps.encoding)));
        lines.push(format!("FPS range: {}", range(caps.frame_rate_range)));
        lines.push(format!("Bitrate:   {} kbps", range(caps.bitrate_range)));
    }
    if let Some(message) = &c.error_message {
        lines.push(format!("Error:     {message}"));
    }
    if let Some(hint) = &c.hint {
        lines.push(format!("Hint:      {hint}"));
    }

    let mut out = lines.join("\n");
    if let Some(caps) = c.capabilities.as_ref().filter(|caps| !caps.resolutions.is_empty()) {
        let current = c.current.map(|cfg| cfg.resolution);
        let rows: Vec<ResolutionRow> = caps
            .resolutions
            .iter()
            .map(|r| ResolutionRow {
                width: r.width,
                height: r.height,
                current: if Some(*r) == current { "*" } else { "" }.into(),
            })
            .collect();
        let _ = write!(out, "\n{}", output::render_table(&rows));
    }
    out
}

async fn check(id: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let records = config::inventory(global, &cfg)?;
    let record = records
        .iter()
        .find(|r| r.id == id)
        .ok_or_else(|| CliError::NotFound {
            resource_type: "camera".into(),
            identifier: id.to_owned(),
            list_command: "devices list".into(),
        })?;
    let device = camfleet_config::to_device(record)?;
    let engine = config::engine_config(global, &cfg)?;

    let transport = TransportConfig::default().with_timeout(engine.request_timeout);
    let registry = Arc::new(DeviceClientRegistry::with_devices(
        Arc::new(OnvifClientFactory::new(transport)),
        vec![device.clone()],
    ));
    let applier = ConfigApplier::new(registry, engine.apply);

    tracing::info!(camera = %device.id, address = %device.address(), "checking camera");
    let result = applier.check(&device).await;

    let color = output::should_color(config::color_mode(global, &cfg));
    let out = output::render_single(
        config::output_format(global, &cfg),
        &result,
        |c| check_detail(c, color),
        |c| format!("{}\t{}", c.device_id, c.status),
    )?;
    output::print_output(&out, global.quiet);

    match result.status {
        Reachability::Online => Ok(()),
        status => Err(CliError::CheckFailed {
            camera: result.device_id,
            status,
        }),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List => {
            let cfg = config::load(global)?;
            let mut records = config::inventory(global, &cfg)?;
            records.sort_by(|a, b| compare_ids(&a.id, &b.id));

            let out = output::render_list(
                config::output_format(global, &cfg),
                &records,
                |r| DeviceRow::from(r),
                |r| r.id.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
        DevicesCommand::Check { id } => check(&id, global).await,
    }
}
