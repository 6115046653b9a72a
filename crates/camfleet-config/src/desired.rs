// ── Desired configuration import (CSV) ──
//
// One header row and one data row. Required: width, height, fps.
// Optional: bitrate (kbps), encoding. Rows past the first are ignored.

use std::collections::HashMap;
use std::path::Path;

use crate::inventory::split_csv_line;
use crate::{ConfigError, Desired};

const REQUIRED: [&str; 3] = ["width", "height", "fps"];

fn bad(reason: impl Into<String>) -> ConfigError {
    ConfigError::DesiredCsv(reason.into())
}

/// Read and parse a desired-configuration CSV file.
pub fn load_desired_csv(path: &Path) -> Result<Desired, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse_desired_csv(&text)
}

/// Parse desired-configuration CSV text.
pub fn parse_desired_csv(text: &str) -> Result<Desired, ConfigError> {
    let mut lines = text
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty());

    let header = lines.next().ok_or_else(|| bad("file is empty"))?;
    let columns: HashMap<String, usize> = split_csv_line(header)
        .into_iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_ascii_lowercase(), i))
        .collect();
    if let Some(missing) = REQUIRED.iter().find(|c| !columns.contains_key(**c)) {
        return Err(bad(format!("required column '{missing}' not found in header")));
    }

    let row = lines
        .next()
        .ok_or_else(|| bad("header found but no configuration row"))?;
    let fields = split_csv_line(row);
    let get = |name: &str| {
        columns
            .get(name)
            .and_then(|&i| fields.get(i))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    };
    let positive = |name: &str, raw: &str| match raw.parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(bad(format!("invalid {name} value '{raw}'"))),
    };
    let required = |name: &str| {
        let raw = get(name).ok_or_else(|| bad(format!("{name} value is required")))?;
        positive(name, raw)
    };

    Ok(Desired {
        width: required("width")?,
        height: required("height")?,
        fps: Some(required("fps")?),
        bitrate: get("bitrate").map(|raw| positive("bitrate", raw)).transpose()?,
        encoding: get("encoding").map(str::to_owned),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn err_text(text: &str) -> String {
        parse_desired_csv(text)
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default()
    }

    #[test]
    fn reads_first_row_with_any_header_order() {
        let desired = parse_desired_csv("FPS, Height ,width,bitrate\n25,1080,1920,4096\n1,1,1,1\n");
        assert_eq!(
            desired.ok(),
            Some(Desired {
                width: 1920,
                height: 1080,
                fps: Some(25),
                bitrate: Some(4096),
                encoding: None,
            })
        );
    }

    #[test]
    fn bitrate_and_encoding_are_optional() {
        let desired = parse_desired_csv("width,height,fps,encoding\r\n1280,720,15,H265\r\n");
        let desired = desired.ok();
        assert_eq!(desired.as_ref().and_then(|d| d.bitrate), None);
        assert_eq!(
            desired.and_then(|d| d.encoding).as_deref(),
            Some("H265")
        );

        let blank = parse_desired_csv("width,height,fps,bitrate\n1280,720,15,\n");
        assert_eq!(blank.ok().and_then(|d| d.bitrate), None);
    }

    #[test]
    fn rejects_missing_columns_and_bad_values() {
        assert!(err_text("width,height\n1920,1080\n").contains("'fps'"));
        assert!(err_text("").contains("empty"));
        assert!(err_text("width,height,fps\n").contains("no configuration row"));
        assert!(err_text("width,height,fps\n1920,0,30\n").contains("invalid height value '0'"));
        assert!(err_text("width,height,fps\n1920,1080,\n").contains("fps value is required"));
        assert!(err_text("width,height,fps,bitrate\n1920,1080,30,-5\n").contains("bitrate"));
    }
}
