//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one line per item.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use camfleet_core::{DeviceOutcome, Reachability};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

/// Outcome label, colored by severity when `color` is set.
pub fn outcome_label(outcome: DeviceOutcome, color: bool) -> String {
    let label = outcome.to_string();
    if !color {
        return label;
    }
    match outcome {
        DeviceOutcome::Pass => label.green().to_string(),
        DeviceOutcome::Warning => label.yellow().to_string(),
        DeviceOutcome::Fail | DeviceOutcome::ConfigError => label.red().bold().to_string(),
        DeviceOutcome::Skipped | DeviceOutcome::Cancelled => label.dimmed().to_string(),
    }
}

/// Device check status, colored by health.
pub fn status_label(status: Reachability) -> String {
    let label = status.to_string();
    match status {
        Reachability::Online => label.green().to_string(),
        Reachability::Partial => label.yellow().to_string(),
        Reachability::Offline | Reachability::Error => label.red().bold().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
        OutputFormat::JsonCompact => Ok(serde_json::to_string(data)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(data)?),
        OutputFormat::Plain => Ok(data.iter().map(&id_fn).collect::<Vec<_>>().join("\n")),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, which returns a pre-formatted string.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    plain_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
        OutputFormat::JsonCompact => Ok(serde_json::to_string(data)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(data)?),
        OutputFormat::Plain => Ok(plain_fn(data)),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize, Tabled)]
    struct Row {
        id: String,
        ip: String,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                id: "1".into(),
                ip: "10.0.0.1".into(),
            },
            Row {
                id: "2".into(),
                ip: "10.0.0.2".into(),
            },
        ]
    }

    #[test]
    fn plain_is_one_id_per_line() {
        let to_row = |r: &Row| Row {
            id: r.id.clone(),
            ip: r.ip.clone(),
        };
        let out =
            render_list(OutputFormat::Plain, &rows(), to_row, |r| r.id.clone()).unwrap_or_default();
        assert_eq!(out, "1\n2");
    }

    #[test]
    fn compact_json_is_single_line() {
        let out = render_list(
            OutputFormat::JsonCompact,
            &rows(),
            |r| Row {
                id: r.id.clone(),
                ip: r.ip.clone(),
            },
            |r| r.id.clone(),
        )
        .unwrap_or_default();
        assert_eq!(out, r#"[{"id":"1","ip":"10.0.0.1"},{"id":"2","ip":"10.0.0.2"}]"#);
    }

    #[test]
    fn uncolored_outcome_is_plain_text() {
        assert_eq!(outcome_label(DeviceOutcome::ConfigError, false), "CONFIG_ERROR");
        assert!(outcome_label(DeviceOutcome::Pass, true).contains("PASS"));
    }
}
