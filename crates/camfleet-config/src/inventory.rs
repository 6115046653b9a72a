// ── Camera inventory (CSV) ──
//
// Header-driven: column order is free and names are matched
// case-insensitively. Required: id, ip, port. Optional: url, username,
// password, isFake, password_env, base_path.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Serialize;

use crate::ConfigError;

const REQUIRED: [&str; 3] = ["id", "ip", "port"];

/// One inventory row, before credential resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraRecord {
    pub id: String,
    pub ip: String,
    pub port: u16,
    /// Device service URL as recorded by the operator, informational.
    pub url: Option<String>,
    pub username: String,
    /// Plaintext password (prefer `password_env` or the keyring).
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Environment variable holding the password.
    pub password_env: Option<String>,
    /// Path prefix the ONVIF services live under.
    pub base_path: Option<String>,
    pub is_fake: bool,
}

/// Read and parse an inventory file.
pub fn load_inventory(path: &Path) -> Result<Vec<CameraRecord>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::InventoryIo {
        path: path.to_path_buf(),
        source,
    })?;
    parse_inventory(&text)
}

/// Parse inventory CSV text.
pub fn parse_inventory(text: &str) -> Result<Vec<CameraRecord>, ConfigError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
        .filter(|(_, l)| !l.trim().is_empty());

    let Some((_, header)) = lines.next() else {
        return Err(ConfigError::MissingColumn {
            column: REQUIRED[0].into(),
        });
    };
    let columns: HashMap<String, usize> = split_csv_line(header)
        .into_iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_ascii_lowercase(), i))
        .collect();
    for column in REQUIRED {
        if !columns.contains_key(column) {
            return Err(ConfigError::MissingColumn {
                column: column.into(),
            });
        }
    }

    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for (row, line) in lines {
        let fields = split_csv_line(line);
        let get = |name: &str| -> Option<String> {
            columns
                .get(name)
                .and_then(|&i| fields.get(i))
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };
        let invalid = |reason: String| ConfigError::Inventory { row, reason };

        let id = get("id").ok_or_else(|| invalid("missing id".into()))?;
        let ip = get("ip").ok_or_else(|| invalid(format!("camera {id}: missing ip")))?;
        let port_raw = get("port").unwrap_or_default();
        let port = port_raw
            .parse::<u16>()
            .ok()
            .filter(|&p| p > 0)
            .ok_or_else(|| invalid(format!("camera {id}: invalid port '{port_raw}'")))?;
        let is_fake = match get("isfake") {
            None => false,
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| invalid(format!("camera {id}: invalid isFake value '{raw}'")))?,
        };

        if !seen.insert(id.clone()) {
            return Err(ConfigError::DuplicateId { id, row });
        }

        records.push(CameraRecord {
            ip,
            port,
            url: get("url"),
            username: get("username").unwrap_or_default(),
            password: get("password"),
            password_env: get("password_env"),
            base_path: get("base_path"),
            is_fake,
            id,
        });
    }
    Ok(records)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" => Some(true),
        "0" | "f" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Split one CSV line, honoring double-quoted fields and `""` escapes.
pub(crate) fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', _) => in_quotes = !in_quotes,
            (',', false) => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}
