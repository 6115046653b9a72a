// ── Core error types ──
//
// Per-device errors from camfleet-core. Consumers never see SOAP faults or
// reqwest errors directly: `CoreError::from_api` translates
// transport-layer errors into domain variants, and `CoreError::in_stage`
// attributes them to the apply step that was running.

use std::time::Duration;

use camfleet_api::TransportConfig;
use serde::Serialize;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to device at {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Device rejected credentials: {message}")]
    NotAuthorized { message: String },

    #[error("Device request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Apply errors ─────────────────────────────────────────────────
    #[error("Failed to get camera profiles and configs: {message}")]
    DiscoveryFailed { message: String },

    #[error("No usable profiles or encoder configurations found")]
    NoUsableProfiles,

    #[error("Failed to get encoder options: {message}")]
    CapabilitiesFailed { message: String },

    #[error("Failed to get current encoder config: {message}")]
    ReadFailed { message: String },

    #[error("Failed to set encoder config: {message}")]
    WriteRejected { message: String },

    #[error("Failed to get stream URI: {message}")]
    StreamUrl { message: String },

    #[error("Configuration verification failed: requested {expected}, device reports {actual}")]
    VerificationFailed { expected: String, actual: String },

    // ── Probe errors ─────────────────────────────────────────────────
    #[error("Stream probe failed: {message}")]
    ProbeFailed { message: String },

    // ── Lookup / input errors ────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Operation not supported: {operation}")]
    Unsupported { operation: String },

    #[error("Batch cancelled before this device was processed")]
    Cancelled,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("Device API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which apply step an error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovery,
    Capabilities,
    ReadConfig,
    WriteConfig,
    StreamUrl,
}

impl CoreError {
    /// Attribute a protocol error to an apply step.
    ///
    /// Connectivity errors (refused, timeout, credentials) pass through
    /// unchanged so classification still sees them.
    pub fn in_stage(self, stage: Stage) -> Self {
        if matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::Timeout { .. }
                | Self::NotAuthorized { .. }
                | Self::NoUsableProfiles
        ) {
            return self;
        }
        let message = match &self {
            Self::Api { message, .. } => message.clone(),
            other => other.to_string(),
        };
        match stage {
            Stage::Discovery => Self::DiscoveryFailed { message },
            Stage::Capabilities => Self::CapabilitiesFailed { message },
            Stage::ReadConfig => Self::ReadFailed { message },
            Stage::WriteConfig => Self::WriteRejected { message },
            Stage::StreamUrl => Self::StreamUrl { message },
        }
    }

    /// Whether the primary protocol is unusable and the fallback protocol
    /// should be tried.
    pub fn triggers_fallback(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } => {
                matches!(self.class(), ErrorClass::ConnectionRefused | ErrorClass::Other)
            }
            Self::DiscoveryFailed { .. }
            | Self::NoUsableProfiles
            | Self::CapabilitiesFailed { .. } => true,
            _ => false,
        }
    }

    /// Operator-facing category for this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Timeout { .. } => ErrorClass::Timeout,
            Self::ConnectionFailed { reason, .. } => {
                classify_network(reason).unwrap_or(ErrorClass::Other)
            }
            Self::DiscoveryFailed { message }
            | Self::CapabilitiesFailed { message }
            | Self::ReadFailed { message } => {
                classify_network(message).unwrap_or(ErrorClass::Discovery)
            }
            Self::NoUsableProfiles => ErrorClass::Discovery,
            Self::NotAuthorized { .. } => ErrorClass::Unauthorized,
            Self::WriteRejected { .. } => ErrorClass::Write,
            Self::VerificationFailed { .. } => ErrorClass::Verification,
            Self::StreamUrl { .. } => ErrorClass::StreamUrl,
            Self::DeviceNotFound { .. } => ErrorClass::NotFound,
            Self::Cancelled => ErrorClass::Cancelled,
            Self::Api { message, .. } => classify_network(message).unwrap_or(ErrorClass::Other),
            Self::ProbeFailed { .. }
            | Self::ValidationFailed { .. }
            | Self::Unsupported { .. }
            | Self::Config { .. }
            | Self::Internal(_) => ErrorClass::Other,
        }
    }
}

// ── Classification ──────────────────────────────────────────────────

/// Operator-actionable failure category. Purely descriptive: no code path
/// retries or branches on it except the protocol fallback decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorClass {
    Timeout,
    ConnectionRefused,
    NoRouteToHost,
    Unauthorized,
    Discovery,
    Write,
    Verification,
    StreamUrl,
    NotFound,
    Cancelled,
    Other,
}

impl ErrorClass {
    /// Troubleshooting hint naming the device address, for the classes
    /// an operator can act on.
    pub fn operator_hint(self, host: &str, port: u16) -> Option<String> {
        match self {
            Self::Timeout => Some(format!(
                "camera at {host}:{port} is not responding. Check that the camera is powered on \
                 and connected, that {host} is the correct address, that {port} is the ONVIF \
                 port, and that the camera supports ONVIF"
            )),
            Self::ConnectionRefused => Some(format!(
                "camera at {host}:{port} refused the connection. Check the ONVIF port (common: \
                 80, 8080, 554), that the ONVIF service is enabled, and firewall settings"
            )),
            Self::NoRouteToHost => Some(format!(
                "cannot reach camera at {host}:{port}. Check that the camera and this host share \
                 a network, that the address is correct, and network routing"
            )),
            Self::Unauthorized => Some(format!(
                "camera at {host}:{port} rejected the credentials. Check the username and \
                 password and that the device clock is roughly correct (WS-Security digests \
                 are time-stamped)"
            )),
            _ => None,
        }
    }
}

/// Classify a transport error message into a network category.
pub fn classify_network(message: &str) -> Option<ErrorClass> {
    let lower = message.to_ascii_lowercase();
    if lower.contains("timed out") || lower.contains("timeout") || lower.contains("deadline") {
        Some(ErrorClass::Timeout)
    } else if lower.contains("connection refused") {
        Some(ErrorClass::ConnectionRefused)
    } else if lower.contains("no route to host")
        || lower.contains("host unreachable")
        || lower.contains("network is unreachable")
    {
        Some(ErrorClass::NoRouteToHost)
    } else {
        None
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl CoreError {
    /// Translate a transport-layer error. `timeout` is the request timeout
    /// the failing client was built with; reqwest does not report it.
    pub fn from_api(err: camfleet_api::Error, timeout: Duration) -> Self {
        let chain = err.chain_message();
        match err {
            camfleet_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            camfleet_api::Error::Transport(ref e) => {
                let address = e
                    .url()
                    .map(|u| {
                        let host = u.host_str().unwrap_or("<unknown>");
                        match u.port_or_known_default() {
                            Some(port) => format!("{host}:{port}"),
                            None => host.to_owned(),
                        }
                    })
                    .unwrap_or_else(|| "<unknown>".into());
                if e.is_timeout() {
                    CoreError::Timeout {
                        timeout_secs: timeout.as_secs().max(1),
                    }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        address,
                        reason: chain,
                    }
                } else {
                    CoreError::Api {
                        message: chain,
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            camfleet_api::Error::NotAuthorized { message } => CoreError::NotAuthorized { message },
            camfleet_api::Error::SoapFault { code, reason } => CoreError::Api {
                message: format!("{reason} ({code})"),
                status: None,
            },
            camfleet_api::Error::Http { status, body } => CoreError::Api {
                message: format!("HTTP {status}: {body}"),
                status: Some(status),
            },
            camfleet_api::Error::Deserialization { message, .. } => CoreError::Api {
                message,
                status: None,
            },
            camfleet_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid device URL: {e}"),
            },
            camfleet_api::Error::UnsupportedOperation(op) => CoreError::Unsupported {
                operation: op.into(),
            },
        }
    }
}

impl From<camfleet_api::Error> for CoreError {
    fn from(err: camfleet_api::Error) -> Self {
        Self::from_api(err, TransportConfig::default().timeout)
    }
}
