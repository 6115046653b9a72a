// ── Engine configuration ──
//
// Tunable policy for matching, applying and validating. Built by the CLI
// from config files and flags; core never reads config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Loose aspect-ratio tolerance (absolute difference of width/height ratios).
pub const LOOSE_RATIO_TOLERANCE: f64 = 0.5;
/// Strict aspect-ratio tolerance.
pub const STRICT_RATIO_TOLERANCE: f64 = 0.1;

/// How a frame-rate mismatch is graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FrameRatePolicy {
    /// Surfaced to operators but does not fail validation.
    #[default]
    Warning,
    /// Fails validation like a resolution mismatch.
    Error,
}

/// Stream validation tolerances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationPolicy {
    /// Allowed relative bitrate deviation (0.10 = 10%).
    pub bitrate_tolerance: f64,
    pub frame_rate_policy: FrameRatePolicy,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            bitrate_tolerance: 0.10,
            frame_rate_policy: FrameRatePolicy::Warning,
        }
    }
}

/// Per-device apply behaviour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApplyPolicy {
    /// Maximum |target ratio - candidate ratio| for a resolution to count
    /// as the same shape.
    pub ratio_tolerance: f64,
    /// Try the secondary protocol when the primary one is unusable.
    pub fallback_enabled: bool,
    /// Frame rate written by the fallback path when neither the request
    /// nor the device supplies one.
    pub fallback_frame_rate: u32,
}

impl Default for ApplyPolicy {
    fn default() -> Self {
        Self {
            ratio_tolerance: LOOSE_RATIO_TOLERANCE,
            fallback_enabled: true,
            fallback_frame_rate: 15,
        }
    }
}

/// Batch scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Devices processed at once in each phase.
    pub concurrency: usize,
    /// Wait between the apply and validate phases, shared by the batch.
    pub settle_delay: Duration,
    /// Overall deadline after which no new device work is dispatched.
    pub timeout: Option<Duration>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            settle_delay: Duration::from_secs(1),
            timeout: None,
        }
    }
}

/// Everything the engine needs, in one place.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub apply: ApplyPolicy,
    pub validation: ValidationPolicy,
    pub batch: BatchConfig,
    /// Per-request device timeout.
    pub request_timeout: Duration,
    /// Per-probe timeout (covers the whole ffprobe run).
    pub probe_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            apply: ApplyPolicy::default(),
            validation: ValidationPolicy::default(),
            batch: BatchConfig::default(),
            request_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(15),
        }
    }
}
