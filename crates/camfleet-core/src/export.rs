// ── CSV export projection ──
//
// One row per device, sorted by id (numerically when both ids are
// numbers). Pure formatting over a finished `BatchReport`.

use std::cmp::Ordering;
use std::io::Write;

use crate::model::{BatchEntry, BatchReport, DeviceOutcome, EncoderConfig, Encoding};

pub const CSV_HEADER: [&str; 10] = [
    "device_id",
    "device_address",
    "result",
    "resolution_expected",
    "resolution_actual",
    "framerate_expected",
    "framerate_actual",
    "encoding_expected",
    "encoding_actual",
    "notes",
];

/// Order device ids numerically when both parse, else lexicographically.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Quote a CSV field if it contains a delimiter, quote or newline.
pub fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

fn encoding_cell(encoding: Option<Encoding>) -> String {
    encoding.map(|e| e.to_string()).unwrap_or_default()
}

fn positive(v: u32) -> String {
    if v > 0 { v.to_string() } else { String::new() }
}

fn row(entry: &BatchEntry, desired: &EncoderConfig) -> [String; 10] {
    let outcome = entry.outcome();
    let id = entry.device_id.clone();
    let address = entry.address.clone();

    if matches!(outcome, DeviceOutcome::ConfigError | DeviceOutcome::Cancelled) {
        let message = entry
            .apply
            .error_message
            .as_deref()
            .unwrap_or("configuration failed");
        let note = if outcome == DeviceOutcome::Cancelled {
            format!("Not processed: {message}")
        } else {
            format!("Configuration Error: {message}")
        };
        return [
            id,
            address,
            outcome.to_string(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            note,
        ];
    }

    let expected = entry.validation.as_ref().map_or(*desired, |v| v.expected);
    let observed = entry.validation.as_ref().map(|v| v.observed);
    let mut notes = entry.notes();
    if notes.is_empty() && outcome == DeviceOutcome::Pass {
        notes = "All parameters match expected values".into();
    }

    [
        id,
        address,
        outcome.to_string(),
        expected.resolution.to_string(),
        observed
            .filter(|o| !o.resolution.is_zero())
            .map(|o| o.resolution.to_string())
            .unwrap_or_default(),
        positive(expected.frame_rate),
        observed.map(|o| positive(o.frame_rate)).unwrap_or_default(),
        encoding_cell(expected.encoding),
        encoding_cell(observed.and_then(|o| o.encoding)),
        notes,
    ]
}

/// Write the report as CSV.
pub fn write_csv<W: Write>(report: &BatchReport, mut out: W) -> std::io::Result<()> {
    writeln!(out, "{}", CSV_HEADER.join(","))?;

    let mut entries: Vec<&BatchEntry> = report.entries.iter().collect();
    entries.sort_by(|a, b| compare_ids(&a.device_id, &b.device_id));

    for entry in entries {
        let cells = row(entry, &report.desired);
        let line = cells
            .iter()
            .map(|c| csv_escape(c))
            .collect::<Vec<_>>()
            .join(",");
        writeln!(out, "{line}")?;
    }
    out.flush()
}

/// Render the report as a CSV string.
pub fn to_csv(report: &BatchReport) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_csv(report, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}
