// ── Per-device outcome types ──

use serde::{Serialize, Serializer};

use super::encoder::{EncoderConfig, Encoding, Resolution};
use crate::error::{CoreError, ErrorClass};

/// Which device API variant produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Protocol {
    /// Media ver10.
    Primary,
    /// Media2 ver20, reduced capability.
    Fallback,
}

/// Outcome of applying a configuration to one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyResult {
    pub device_id: String,
    pub success: bool,
    /// The device already matched; nothing was written.
    pub unchanged: bool,
    pub protocol: Option<Protocol>,
    pub profile_token: Option<String>,
    pub applied_config: Option<EncoderConfig>,
    /// The matched resolution differs from the requested one.
    pub resolution_adjusted: bool,
    /// Stream URL with credentials embedded (redacted when serialized).
    #[serde(serialize_with = "serialize_redacted_url")]
    pub stream_url: Option<String>,
    pub error_class: Option<ErrorClass>,
    pub error_message: Option<String>,
    /// Troubleshooting hint for network-level failures.
    pub hint: Option<String>,
}

impl ApplyResult {
    pub fn failed(device_id: impl Into<String>, err: &CoreError) -> Self {
        Self {
            device_id: device_id.into(),
            success: false,
            unchanged: false,
            protocol: None,
            profile_token: None,
            applied_config: None,
            resolution_adjusted: false,
            stream_url: None,
            error_class: Some(err.class()),
            error_message: Some(err.to_string()),
            hint: None,
        }
    }

    /// Stream URL with any password replaced by `***`, for display.
    pub fn redacted_stream_url(&self) -> Option<String> {
        self.stream_url.as_deref().map(redact_url)
    }
}

/// Replace the password component of a URL with `***`.
///
/// URLs that cannot be rewritten lose their whole userinfo instead; the
/// raw text never comes back while it may carry a password.
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut url) if url.password().is_some() => match url.set_password(Some("***")) {
            Ok(()) => url.to_string(),
            Err(()) => redact_userinfo(raw),
        },
        Ok(_) => raw.to_owned(),
        Err(_) => redact_userinfo(raw),
    }
}

/// `scheme://user:pw@host/path` → `scheme://***@host/path`, textually.
/// Passwords may contain `/`, so everything up to the last `@` goes.
fn redact_userinfo(raw: &str) -> String {
    let Some((scheme, rest)) = raw.split_once("://") else {
        return raw.to_owned();
    };
    match rest.rsplit_once('@') {
        Some((_, host)) => format!("{scheme}://***@{host}"),
        None => raw.to_owned(),
    }
}

#[allow(clippy::ref_option)]
pub(crate) fn serialize_redacted_url<S: Serializer>(
    url: &Option<String>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match url {
        Some(u) => s.serialize_some(&redact_url(u)),
        None => s.serialize_none(),
    }
}

// ── Validation ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IssueField {
    Resolution,
    FrameRate,
    Bitrate,
    Encoding,
    Probe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub field: IssueField,
    pub severity: Severity,
    pub detail: String,
}

impl Issue {
    pub fn error(field: IssueField, detail: impl Into<String>) -> Self {
        Self {
            field,
            severity: Severity::Error,
            detail: detail.into(),
        }
    }

    pub fn warning(field: IssueField, detail: impl Into<String>) -> Self {
        Self {
            field,
            severity: Severity::Warning,
            detail: detail.into(),
        }
    }
}

/// Raw stream properties as measured by a probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamInfo {
    /// Codec name exactly as the probe reported it.
    pub codec: String,
    pub encoding: Option<Encoding>,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub bitrate_kbps: Option<u32>,
}

impl StreamInfo {
    /// Project onto an [`EncoderConfig`] in the observed role.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
    pub fn observed(&self) -> EncoderConfig {
        let fps = if self.frame_rate.is_finite() && self.frame_rate > 0.0 {
            (self.frame_rate + 0.5).floor() as u32
        } else {
            0
        };
        EncoderConfig {
            resolution: Resolution::new(self.width, self.height),
            quality: 0,
            frame_rate: fps,
            bitrate_kbps: self.bitrate_kbps.unwrap_or(0),
            encoding: self.encoding,
        }
    }
}

/// Per-device verdict, derived from `is_valid` and issue severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ValidationOutcome {
    Pass,
    Warning,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub device_id: String,
    pub is_valid: bool,
    pub expected: EncoderConfig,
    pub observed: EncoderConfig,
    pub issues: Vec<Issue>,
    /// Raw probe measurements, when the probe succeeded.
    pub stream: Option<StreamInfo>,
}

impl ValidationResult {
    /// Passing result that mirrors `expected` exactly (simulated devices).
    pub fn synthesized(device_id: impl Into<String>, expected: EncoderConfig) -> Self {
        Self {
            device_id: device_id.into(),
            is_valid: true,
            expected,
            observed: expected,
            issues: Vec::new(),
            stream: None,
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    pub fn outcome(&self) -> ValidationOutcome {
        if !self.is_valid {
            ValidationOutcome::Fail
        } else if self.warnings().next().is_some() {
            ValidationOutcome::Warning
        } else {
            ValidationOutcome::Pass
        }
    }
}
