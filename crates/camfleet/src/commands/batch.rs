//! Apply and validate handlers: build the engine from config, run one
//! batch, render the report.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::Path;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tabled::Tabled;

use camfleet_api::TransportConfig;
use camfleet_config::CameraRecord;
use camfleet_core::{
    BatchEntry, BatchEvent, BatchMode, BatchOrchestrator, BatchReport, DeviceClientRegistry,
    EncoderConfig, EngineConfig, FfprobeProbe, OnvifClientFactory, ProgressFn,
    STRICT_RATIO_TOLERANCE, export,
};

use crate::cli::{ApplyArgs, GlobalOpts, ValidateArgs};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Applied")]
    applied: String,
    #[tabled(rename = "Observed")]
    observed: String,
    #[tabled(rename = "Notes")]
    notes: String,
}

impl EntryRow {
    fn new(entry: &BatchEntry) -> Self {
        let observed = entry
            .validation
            .as_ref()
            .filter(|v| v.stream.is_some())
            .map(|v| v.observed.to_string());
        Self {
            id: entry.device_id.clone(),
            address: entry.address.clone(),
            result: entry.outcome().to_string(),
            applied: entry
                .apply
                .applied_config
                .map(|c| c.to_string())
                .unwrap_or_default(),
            observed: observed.unwrap_or_default(),
            notes: entry.notes(),
        }
    }
}

fn summary_line(report: &BatchReport, color: bool) -> String {
    let s = &report.summary;
    let mut line = format!("{} cameras: ", s.total);
    let parts = [
        (s.validation_passed, "PASS"),
        (s.validation_warned, "WARNING"),
        (s.validation_failed, "FAIL"),
        (s.apply_failed, "CONFIG_ERROR"),
        (s.not_validated, "SKIPPED"),
        (s.cancelled, "CANCELLED"),
    ];
    let counts: Vec<String> = parts
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, label)| format!("{n} {label}"))
        .collect();
    line.push_str(&counts.join(", "));
    if s.fallback_used > 0 {
        let _ = write!(line, " ({} via fallback)", s.fallback_used);
    }
    if report.cancelled {
        line.push_str(" [cancelled]");
    }
    match (color, report.has_failures()) {
        (false, _) => line,
        (true, true) => line.red().to_string(),
        (true, false) => line.green().to_string(),
    }
}

fn detail(report: &BatchReport, color: bool) -> String {
    let rows: Vec<EntryRow> = report.entries.iter().map(EntryRow::new).collect();
    let mut out = output::render_table(&rows);
    for entry in &report.entries {
        if let Some(hint) = &entry.apply.hint {
            let _ = write!(out, "\n{}: {hint}", entry.device_id);
        }
    }
    let _ = write!(out, "\n{}", summary_line(report, color));
    out
}

fn plain(report: &BatchReport) -> String {
    report
        .entries
        .iter()
        .map(|e| format!("{}\t{}", e.device_id, e.outcome()))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Engine wiring ───────────────────────────────────────────────────

fn orchestrator(
    records: &[CameraRecord],
    ids: &[String],
    cfg: &Config,
    engine: &EngineConfig,
) -> Result<BatchOrchestrator, CliError> {
    let mut devices = Vec::new();
    for record in records.iter().filter(|r| ids.contains(&r.id)) {
        devices.push(camfleet_config::to_device(record)?);
    }
    tracing::debug!(selected = devices.len(), requested = ids.len(), "devices resolved");

    let transport = TransportConfig::default().with_timeout(engine.request_timeout);
    let factory = Arc::new(OnvifClientFactory::new(transport));
    let registry = Arc::new(DeviceClientRegistry::with_devices(factory, devices));
    let probe = Arc::new(FfprobeProbe::new(
        cfg.defaults.ffprobe.clone(),
        engine.probe_timeout,
    ));
    Ok(BatchOrchestrator::from_engine(registry, probe, engine))
}

fn progress_bar(quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template("{spinner} {msg:<10} [{bar:30}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    Some(bar)
}

fn progress_fn(bar: ProgressBar) -> ProgressFn {
    Arc::new(move |event: &BatchEvent| match event {
        BatchEvent::Started { total, .. } => {
            // one step per camera for each of the apply and validate phases
            bar.set_length(u64::try_from(*total).unwrap_or(u64::MAX).saturating_mul(2));
            bar.set_message("applying");
        }
        BatchEvent::Applied { .. } | BatchEvent::Validated { .. } => bar.inc(1),
        BatchEvent::Settling { delay } => {
            bar.set_message(format!("settling {}ms", delay.as_millis()));
        }
        BatchEvent::Finished { .. } => bar.finish_and_clear(),
    })
}

async fn run(
    orchestrator: BatchOrchestrator,
    ids: &[String],
    desired: &EncoderConfig,
    mode: BatchMode,
    quiet: bool,
) -> Result<BatchReport, CliError> {
    let bar = progress_bar(quiet);
    let orchestrator = match &bar {
        Some(bar) => orchestrator.with_progress(progress_fn(bar.clone())),
        None => orchestrator,
    };

    let token = orchestrator.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; finishing in-flight cameras");
            token.cancel();
        }
    });

    let result = orchestrator.run_mode(ids, desired, mode).await;
    interrupt.abort();
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    result.map_err(CliError::from)
}

fn export_csv(report: &BatchReport, path: &Path, quiet: bool) -> Result<(), CliError> {
    let mut writer = BufWriter::new(File::create(path)?);
    export::write_csv(report, &mut writer)?;
    writer.flush()?;
    if !quiet {
        eprintln!("✓ Results written to {}", path.display());
    }
    Ok(())
}

fn finish(
    report: &BatchReport,
    csv_path: Option<&Path>,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(config::color_mode(global, cfg));
    let out = output::render_single(
        config::output_format(global, cfg),
        report,
        |r| detail(r, color),
        plain,
    )?;
    output::print_output(&out, global.quiet);

    if let Some(path) = csv_path {
        export_csv(report, path, global.quiet)?;
    }

    if report.has_failures() {
        return Err(CliError::BatchFailed {
            failed: report.summary.apply_failed + report.summary.validation_failed,
            total: report.summary.total,
        });
    }
    if report.summary.cancelled > 0 {
        return Err(CliError::BatchCancelled {
            skipped: report.summary.cancelled,
            total: report.summary.total,
        });
    }
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────────

/// `--concurrency` override; zero would never dispatch anything.
fn concurrency(requested: Option<usize>) -> Result<Option<usize>, CliError> {
    match requested {
        Some(0) => Err(CliError::Validation {
            field: "--concurrency".into(),
            reason: "must be at least 1".into(),
        }),
        other => Ok(other),
    }
}

pub async fn apply(args: ApplyArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let records = config::inventory(global, &cfg)?;
    let ids = config::target_ids(&args.targets, &records)?;
    let desired = config::desired(&args.desired, &cfg)?;

    let mut engine = config::engine_config(global, &cfg)?;
    if let Some(n) = concurrency(args.concurrency)? {
        engine.batch.concurrency = n;
    }
    if let Some(ms) = args.settle_ms {
        engine.batch.settle_delay = std::time::Duration::from_millis(ms);
    }
    if args.strict_ratio {
        engine.apply.ratio_tolerance = STRICT_RATIO_TOLERANCE;
    }
    if args.no_fallback {
        engine.apply.fallback_enabled = false;
    }

    tracing::info!(cameras = ids.len(), %desired, "applying configuration");
    let orchestrator = orchestrator(&records, &ids, &cfg, &engine)?;
    let report = run(
        orchestrator,
        &ids,
        &desired,
        BatchMode::ApplyAndValidate,
        global.quiet,
    )
    .await?;
    finish(&report, args.export.as_deref(), &cfg, global)
}

pub async fn validate(args: ValidateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let records = config::inventory(global, &cfg)?;
    let ids = config::target_ids(&args.targets, &records)?;
    let expected = config::desired(&args.desired, &cfg)?;

    let mut engine = config::engine_config(global, &cfg)?;
    if let Some(n) = concurrency(args.concurrency)? {
        engine.batch.concurrency = n;
    }

    tracing::info!(cameras = ids.len(), %expected, "validating streams");
    let orchestrator = orchestrator(&records, &ids, &cfg, &engine)?;
    let report = run(
        orchestrator,
        &ids,
        &expected,
        BatchMode::ValidateOnly,
        global.quiet,
    )
    .await?;
    finish(&report, args.export.as_deref(), &cfg, global)
}
