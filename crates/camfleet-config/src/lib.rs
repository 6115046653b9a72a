//! Configuration for the camfleet CLI.
//!
//! TOML config (defaults, engine policy, a saved desired configuration),
//! camera inventory import, credential resolution (env + keyring +
//! plaintext), and translation into `camfleet_core` types. Nothing in
//! `camfleet-core` reads files; everything it needs is built here.

pub mod desired;
pub mod inventory;

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use camfleet_api::Credentials;
use camfleet_core::{
    ApplyPolicy, BatchConfig, Device, EncoderConfig, Encoding, EngineConfig, FrameRatePolicy,
    LOOSE_RATIO_TOLERANCE, ValidationPolicy,
};

pub use desired::{load_desired_csv, parse_desired_csv};
pub use inventory::{CameraRecord, load_inventory, parse_inventory};

/// Keyring service name for camera passwords.
pub const KEYRING_SERVICE: &str = "camfleet";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for camera '{camera}'")]
    NoCredentials { camera: String },

    #[error("no inventory configured (set `inventory` in config or pass --inventory)")]
    NoInventory,

    #[error("inventory is missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("inventory row {row}: {reason}")]
    Inventory { row: usize, reason: String },

    #[error("desired config CSV: {0}")]
    DesiredCsv(String),

    #[error("inventory row {row}: duplicate camera id '{id}'")]
    DuplicateId { id: String, row: usize },

    #[error("cannot read inventory {}: {source}", path.display())]
    InventoryIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Camera inventory CSV.
    pub inventory: Option<PathBuf>,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub policy: Policy,

    /// Saved desired configuration, used when no size is given on the
    /// command line.
    pub desired: Option<Desired>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Per-request device timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Whole-probe timeout, seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: u64,

    #[serde(default = "default_ffprobe")]
    pub ffprobe: PathBuf,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            probe_timeout: default_probe_timeout(),
            ffprobe: default_ffprobe(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    5
}
fn default_probe_timeout() -> u64 {
    15
}
fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

/// Engine tunables.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Policy {
    #[serde(default = "default_ratio_tolerance")]
    pub ratio_tolerance: f64,

    #[serde(default = "default_bitrate_tolerance")]
    pub bitrate_tolerance: f64,

    #[serde(default)]
    pub frame_rate_policy: FrameRatePolicy,

    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    pub batch_timeout_secs: Option<u64>,

    #[serde(default = "default_true")]
    pub fallback_enabled: bool,

    #[serde(default = "default_fallback_frame_rate")]
    pub fallback_frame_rate: u32,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            ratio_tolerance: default_ratio_tolerance(),
            bitrate_tolerance: default_bitrate_tolerance(),
            frame_rate_policy: FrameRatePolicy::default(),
            settle_delay_ms: default_settle_delay_ms(),
            concurrency: default_concurrency(),
            batch_timeout_secs: None,
            fallback_enabled: true,
            fallback_frame_rate: default_fallback_frame_rate(),
        }
    }
}

fn default_ratio_tolerance() -> f64 {
    LOOSE_RATIO_TOLERANCE
}
fn default_bitrate_tolerance() -> f64 {
    0.10
}
fn default_settle_delay_ms() -> u64 {
    1000
}
fn default_concurrency() -> usize {
    4
}
fn default_true() -> bool {
    true
}
fn default_fallback_frame_rate() -> u32 {
    15
}

/// A desired encoder configuration as written in TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Desired {
    pub width: u32,
    pub height: u32,
    pub fps: Option<u32>,
    /// kbps
    pub bitrate: Option<u32>,
    pub encoding: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "camfleet", "camfleet").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("camfleet");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CAMFLEET_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation into engine types ───────────────────────────────────

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

/// Build the engine configuration from `[defaults]` and `[policy]`.
pub fn to_engine_config(cfg: &Config) -> Result<EngineConfig, ConfigError> {
    let p = &cfg.policy;
    if !p.ratio_tolerance.is_finite() || p.ratio_tolerance < 0.0 {
        return Err(invalid("policy.ratio_tolerance", "must be a non-negative number"));
    }
    if !p.bitrate_tolerance.is_finite() || !(0.0..=1.0).contains(&p.bitrate_tolerance) {
        return Err(invalid("policy.bitrate_tolerance", "must be between 0 and 1"));
    }
    if p.concurrency == 0 {
        return Err(invalid("policy.concurrency", "must be at least 1"));
    }
    if cfg.defaults.timeout == 0 {
        return Err(invalid("defaults.timeout", "must be at least 1 second"));
    }

    Ok(EngineConfig {
        apply: ApplyPolicy {
            ratio_tolerance: p.ratio_tolerance,
            fallback_enabled: p.fallback_enabled,
            fallback_frame_rate: p.fallback_frame_rate,
        },
        validation: ValidationPolicy {
            bitrate_tolerance: p.bitrate_tolerance,
            frame_rate_policy: p.frame_rate_policy,
        },
        batch: BatchConfig {
            concurrency: p.concurrency,
            settle_delay: Duration::from_millis(p.settle_delay_ms),
            timeout: p.batch_timeout_secs.map(Duration::from_secs),
        },
        request_timeout: Duration::from_secs(cfg.defaults.timeout),
        probe_timeout: Duration::from_secs(cfg.defaults.probe_timeout),
    })
}

/// Convert a saved `[desired]` table into an [`EncoderConfig`].
pub fn desired_from(desired: &Desired) -> Result<EncoderConfig, ConfigError> {
    if desired.width == 0 || desired.height == 0 {
        return Err(invalid("desired", "width and height must be non-zero"));
    }
    let mut cfg = EncoderConfig::new(desired.width, desired.height)
        .with_frame_rate(desired.fps.unwrap_or(0))
        .with_bitrate(desired.bitrate.unwrap_or(0));
    if let Some(raw) = desired.encoding.as_deref() {
        let encoding = Encoding::normalize(raw)
            .ok_or_else(|| invalid("desired.encoding", format!("unknown encoding '{raw}'")))?;
        cfg = cfg.with_encoding(encoding);
    }
    Ok(cfg)
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(camera_id: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{camera_id}/password"))
}

/// Resolve a camera password: `password_env` variable, then the system
/// keyring, then the plaintext inventory column.
pub fn resolve_password(record: &CameraRecord) -> Option<SecretString> {
    // 1. Per-camera env var
    if let Some(ref env_name) = record.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(&record.id) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in inventory
    record.password.clone().map(SecretString::from)
}

/// Store a camera password in the system keyring.
pub fn store_password(camera_id: &str, password: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(camera_id)
        .and_then(|entry| entry.set_password(password.expose_secret()))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

/// Build an engine [`Device`] from an inventory row.
pub fn to_device(record: &CameraRecord) -> Result<Device, ConfigError> {
    let password = resolve_password(record);
    if password.is_none() && !record.username.is_empty() && !record.is_fake {
        return Err(ConfigError::NoCredentials {
            camera: record.id.clone(),
        });
    }
    Ok(Device {
        id: record.id.clone(),
        host: record.ip.clone(),
        port: record.port,
        base_path: record.base_path.clone(),
        credentials: Credentials::new(
            record.username.clone(),
            password.unwrap_or_else(|| SecretString::from(String::new())),
        ),
        simulated: record.is_fake,
    })
}

/// Every inventory row as a [`Device`].
pub fn to_devices(records: &[CameraRecord]) -> Result<Vec<Device>, ConfigError> {
    records.iter().map(to_device).collect()
}
