//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use camfleet_config::ConfigError;
use camfleet_core::{CoreError, Reachability};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const VALIDATION_FAILED: i32 = 9;
    pub const CANCELLED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to camera at {address}: {reason}")]
    #[diagnostic(
        code(camfleet::connection_failed),
        help("Check that the camera is powered on and that the inventory port is its ONVIF port.")
    )]
    ConnectionFailed { address: String, reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(camfleet::timeout),
        help("Increase the timeout with --timeout or check camera responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Camera rejected the credentials: {message}")]
    #[diagnostic(
        code(camfleet::auth_failed),
        help("Verify the inventory username, then run: camfleet config set-password <id>")
    )]
    AuthFailed { message: String },

    #[error("No password configured for camera '{camera}'")]
    #[diagnostic(
        code(camfleet::no_credentials),
        help(
            "Store one with: camfleet config set-password {camera}\n\
             Or add a password_env column naming an environment variable."
        )
    )]
    NoCredentials { camera: String },

    // ── Lookup ───────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(camfleet::not_found),
        help("Run: camfleet {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Input ────────────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(camfleet::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No camera inventory configured")]
    #[diagnostic(
        code(camfleet::no_inventory),
        help(
            "Pass --inventory cameras.csv, or set `inventory` in {path}\n\
             Create a config with: camfleet config init"
        )
    )]
    NoInventory { path: String },

    #[error("Invalid camera inventory: {message}")]
    #[diagnostic(
        code(camfleet::inventory),
        help("Required columns: id, ip, port. Optional: url, username, password, isFake, password_env, base_path.")
    )]
    Inventory { message: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(camfleet::config))]
    Config { message: String },

    #[error("Keyring error: {message}")]
    #[diagnostic(code(camfleet::keyring))]
    Keyring { message: String },

    // ── Batch ────────────────────────────────────────────────────────
    #[error("{failed} of {total} cameras failed to apply or validate")]
    #[diagnostic(
        code(camfleet::batch_failed),
        help("See the per-camera notes above, or rerun with --export results.csv.")
    )]
    BatchFailed { failed: usize, total: usize },

    #[error("Batch stopped early: {skipped} of {total} cameras were not processed")]
    #[diagnostic(
        code(camfleet::batch_cancelled),
        help("The batch was interrupted or reached its deadline. Rerun for the remaining cameras, or raise policy.batch_timeout_secs.")
    )]
    BatchCancelled { skipped: usize, total: usize },

    #[error("Camera '{camera}' check status: {status}")]
    #[diagnostic(
        code(camfleet::check_failed),
        help("See the hint above, or rerun with -v for protocol details.")
    )]
    CheckFailed { camera: String, status: Reachability },

    #[error("{message}")]
    #[diagnostic(code(camfleet::engine))]
    Engine { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize output: {0}")]
    #[diagnostic(code(camfleet::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to serialize output: {0}")]
    #[diagnostic(code(camfleet::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            Self::BatchFailed { .. } => exit_code::VALIDATION_FAILED,
            Self::BatchCancelled { .. } => exit_code::CANCELLED,
            Self::CheckFailed { status, .. } => match status {
                Reachability::Offline | Reachability::Error => exit_code::CONNECTION,
                Reachability::Online | Reachability::Partial => exit_code::GENERAL,
            },
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { address, reason } => {
                CliError::ConnectionFailed { address, reason }
            }
            CoreError::NotAuthorized { message } => CliError::AuthFailed { message },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "camera".into(),
                identifier,
                list_command: "devices list".into(),
            },
            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::Config { message } => CliError::Config { message },
            other => CliError::Engine {
                message: other.to_string(),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { camera } => CliError::NoCredentials { camera },
            ConfigError::NoInventory => CliError::NoInventory {
                path: camfleet_config::config_path().display().to_string(),
            },
            ConfigError::MissingColumn { .. }
            | ConfigError::Inventory { .. }
            | ConfigError::DuplicateId { .. }
            | ConfigError::InventoryIo { .. } => CliError::Inventory {
                message: err.to_string(),
            },
            ConfigError::Keyring(message) => CliError::Keyring { message },
            ConfigError::Io(e) => CliError::Io(e),
            ConfigError::Serialization(_)
            | ConfigError::Figment(_)
            | ConfigError::DesiredCsv(_) => CliError::Config {
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        let timeout: CliError = CoreError::Timeout { timeout_secs: 5 }.into();
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);

        let missing: CliError = CoreError::DeviceNotFound {
            identifier: "9".into(),
        }
        .into();
        assert_eq!(missing.exit_code(), exit_code::NOT_FOUND);

        let creds: CliError = ConfigError::NoCredentials { camera: "3".into() }.into();
        assert_eq!(creds.exit_code(), exit_code::AUTH);

        let batch = CliError::BatchFailed { failed: 1, total: 4 };
        assert_eq!(batch.exit_code(), exit_code::VALIDATION_FAILED);
        assert_eq!(batch.to_string(), "1 of 4 cameras failed to apply or validate");

        let stopped = CliError::BatchCancelled { skipped: 3, total: 4 };
        assert_eq!(stopped.exit_code(), exit_code::CANCELLED);
        assert_ne!(stopped.exit_code(), exit_code::VALIDATION_FAILED);
    }

    #[test]
    fn inventory_errors_keep_row() {
        let err: CliError = ConfigError::Inventory {
            row: 4,
            reason: "camera 3: invalid port 'x'".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::GENERAL);
        assert!(err.to_string().contains("inventory row 4"));
    }
}
