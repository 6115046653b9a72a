// ── Stream validation ──
//
// Resolution is a hard requirement; frame rate, bitrate and encoding are
// soft ones whose mismatches are surfaced as warnings. Probe failures are
// folded into the result and never returned as errors.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{FrameRatePolicy, ValidationPolicy};
use crate::model::{
    EncoderConfig, Issue, IssueField, Severity, StreamInfo, ValidationResult, redact_url,
};
use crate::probe::StreamProbe;

/// Compares a probed stream against the configuration it should carry.
#[derive(Clone)]
pub struct StreamValidator {
    probe: Arc<dyn StreamProbe>,
    policy: ValidationPolicy,
}

impl StreamValidator {
    pub fn new(probe: Arc<dyn StreamProbe>, policy: ValidationPolicy) -> Self {
        Self { probe, policy }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Probe `stream_url` once and grade it against `expected`.
    pub async fn validate(
        &self,
        device_id: &str,
        stream_url: &str,
        expected: &EncoderConfig,
    ) -> ValidationResult {
        match self.probe.probe(stream_url).await {
            Ok(info) => {
                let result = evaluate(device_id, expected, &info, &self.policy);
                debug!(
                    device = %device_id,
                    outcome = %result.outcome(),
                    observed = %result.observed,
                    "stream validated"
                );
                result
            }
            Err(e) => {
                warn!(device = %device_id, url = %redact_url(stream_url), error = %e, "probe failed");
                ValidationResult {
                    device_id: device_id.to_owned(),
                    is_valid: false,
                    expected: *expected,
                    observed: EncoderConfig::default(),
                    issues: vec![Issue::error(IssueField::Probe, e.to_string())],
                    stream: None,
                }
            }
        }
    }
}

impl std::fmt::Debug for StreamValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamValidator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Grade probe measurements against `expected`. Pure.
pub fn evaluate(
    device_id: &str,
    expected: &EncoderConfig,
    info: &StreamInfo,
    policy: &ValidationPolicy,
) -> ValidationResult {
    let observed = info.observed();
    let mut issues = Vec::new();

    // Resolution
    if observed.resolution.is_zero() {
        issues.push(Issue::error(
            IssueField::Resolution,
            "unable to detect actual resolution",
        ));
    } else if observed.resolution != expected.resolution {
        issues.push(Issue::error(
            IssueField::Resolution,
            format!(
                "RESOLUTION MISMATCH: got {}, expected {}",
                observed.resolution, expected.resolution
            ),
        ));
    }

    // Frame rate
    if expected.frame_rate > 0 {
        let detail = if observed.frame_rate == 0 {
            Some("unable to detect actual frame rate".to_owned())
        } else if observed.frame_rate != expected.frame_rate {
            Some(format!(
                "FRAME RATE MISMATCH: got {:.2} fps, expected {} fps",
                info.frame_rate, expected.frame_rate
            ))
        } else {
            None
        };
        if let Some(detail) = detail {
            issues.push(match policy.frame_rate_policy {
                FrameRatePolicy::Warning => Issue::warning(IssueField::FrameRate, detail),
                FrameRatePolicy::Error => Issue::error(IssueField::FrameRate, detail),
            });
        }
    }

    // Bitrate
    if expected.bitrate_kbps > 0 {
        match info.bitrate_kbps {
            None | Some(0) => issues.push(Issue::warning(
                IssueField::Bitrate,
                "unable to detect actual bitrate",
            )),
            Some(actual) => {
                let allowed = f64::from(expected.bitrate_kbps) * policy.bitrate_tolerance;
                let diff = f64::from(actual.abs_diff(expected.bitrate_kbps));
                if diff > allowed {
                    issues.push(Issue::warning(
                        IssueField::Bitrate,
                        format!(
                            "BITRATE MISMATCH: got {actual} kbps, expected {} kbps",
                            expected.bitrate_kbps
                        ),
                    ));
                }
            }
        }
    }

    // Encoding is informational only.
    if let (Some(want), Some(got)) = (expected.encoding, observed.encoding) {
        if want != got {
            issues.push(Issue::warning(
                IssueField::Encoding,
                format!("ENCODING MISMATCH: got {got}, expected {want}"),
            ));
        }
    }

    ValidationResult {
        device_id: device_id.to_owned(),
        is_valid: !issues.iter().any(|i| i.severity == Severity::Error),
        expected: *expected,
        observed,
        issues,
        stream: Some(info.clone()),
    }
}
