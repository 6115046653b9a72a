// ── Batch report types ──

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ErrorClass;

use super::encoder::{ConfigRole, EncoderConfig, TaggedConfig};
use super::result::{ApplyResult, Protocol, ValidationOutcome, ValidationResult};

/// What a batch does to each device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BatchMode {
    /// Write the desired configuration, settle, then validate streams.
    #[default]
    ApplyAndValidate,
    /// Only discover stream URLs and validate; no device writes.
    ValidateOnly,
}

/// Combined per-device verdict across both phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceOutcome {
    Pass,
    Warning,
    Fail,
    /// Configuration could not be applied; the stream was never checked.
    ConfigError,
    /// Applied, but validation did not run (batch cancelled).
    Skipped,
    /// Never dispatched: the batch was cancelled or hit its deadline first.
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub device_id: String,
    pub address: String,
    pub apply: ApplyResult,
    pub validation: Option<ValidationResult>,
}

impl BatchEntry {
    pub fn outcome(&self) -> DeviceOutcome {
        if self.was_cancelled() {
            return DeviceOutcome::Cancelled;
        }
        if !self.apply.success {
            return DeviceOutcome::ConfigError;
        }
        match self.validation.as_ref().map(ValidationResult::outcome) {
            Some(ValidationOutcome::Pass) => DeviceOutcome::Pass,
            Some(ValidationOutcome::Warning) => DeviceOutcome::Warning,
            Some(ValidationOutcome::Fail) => DeviceOutcome::Fail,
            None => DeviceOutcome::Skipped,
        }
    }

    /// The device was never touched because the batch stopped first.
    pub fn was_cancelled(&self) -> bool {
        !self.apply.success && self.apply.error_class == Some(ErrorClass::Cancelled)
    }

    /// One-line explanation: the apply error, or the validation issues.
    pub fn notes(&self) -> String {
        if let Some(msg) = &self.apply.error_message {
            return msg.clone();
        }
        let mut notes: Vec<String> = Vec::new();
        if self.apply.unchanged {
            notes.push("unchanged".into());
        }
        if self.apply.protocol == Some(Protocol::Fallback) {
            notes.push("applied via fallback protocol".into());
        }
        if self.apply.resolution_adjusted {
            if let Some(cfg) = &self.apply.applied_config {
                notes.push(format!("resolution adjusted to {}", cfg.resolution));
            }
        }
        if let Some(v) = &self.validation {
            notes.extend(v.issues.iter().map(|i| i.detail.clone()));
        }
        notes.join("; ")
    }

    /// Every configuration known for this device, tagged with its role.
    pub fn configs(&self, desired: EncoderConfig) -> Vec<TaggedConfig> {
        let mut out = vec![TaggedConfig::new(ConfigRole::Desired, desired)];
        if let Some(applied) = self.apply.applied_config {
            out.push(TaggedConfig::new(ConfigRole::Applied, applied));
        }
        if let Some(v) = &self.validation {
            out.push(TaggedConfig::new(ConfigRole::Observed, v.observed));
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub applied: usize,
    pub unchanged: usize,
    pub apply_failed: usize,
    /// Not dispatched because the batch was cancelled; not a failure.
    pub cancelled: usize,
    pub fallback_used: usize,
    pub validation_passed: usize,
    pub validation_warned: usize,
    pub validation_failed: usize,
    pub not_validated: usize,
}

impl BatchSummary {
    pub fn from_entries(entries: &[BatchEntry]) -> Self {
        let mut s = Self {
            total: entries.len(),
            ..Self::default()
        };
        for entry in entries {
            if entry.apply.success {
                s.applied += 1;
            } else if entry.was_cancelled() {
                s.cancelled += 1;
            } else {
                s.apply_failed += 1;
            }
            if entry.apply.unchanged {
                s.unchanged += 1;
            }
            if entry.apply.protocol == Some(Protocol::Fallback) {
                s.fallback_used += 1;
            }
            match entry.outcome() {
                DeviceOutcome::Pass => s.validation_passed += 1,
                DeviceOutcome::Warning => s.validation_warned += 1,
                DeviceOutcome::Fail => s.validation_failed += 1,
                DeviceOutcome::Skipped => s.not_validated += 1,
                DeviceOutcome::ConfigError | DeviceOutcome::Cancelled => {}
            }
        }
        s
    }
}

/// Everything one batch invocation produced, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub mode: BatchMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub desired: EncoderConfig,
    pub cancelled: bool,
    pub entries: Vec<BatchEntry>,
    pub summary: BatchSummary,
}

impl BatchReport {
    pub fn entry(&self, device_id: &str) -> Option<&BatchEntry> {
        self.entries.iter().find(|e| e.device_id == device_id)
    }

    /// Any device that failed to apply or failed validation.
    pub fn has_failures(&self) -> bool {
        self.summary.apply_failed > 0 || self.summary.validation_failed > 0
    }
}
