//! Encoder configuration reconciliation and stream validation for camera
//! fleets.
//!
//! The engine sits between `camfleet-api` (ONVIF wire clients) and the CLI:
//!
//! - **[`ResolutionMatcher`]**: two-tier best-fit selection of an
//!   advertised resolution, same shape first and closest pixel count second.
//!
//! - **[`ConfigApplier`]**: brings one device to the desired encoder
//!   settings (skipping writes that would change nothing) and resolves its
//!   stream URL. Falls back once from the primary (Media) to the fallback
//!   (Media2) protocol when the primary one is unusable. Also runs the
//!   read-only [`DeviceCheck`] behind `devices check`.
//!
//! - **[`StreamValidator`]**: grades a [`StreamProbe`] measurement.
//!   Resolution mismatches fail; frame rate, bitrate and encoding
//!   mismatches warn.
//!
//! - **[`BatchOrchestrator`]**: bounded-parallel apply, one shared settle
//!   delay, then validation; produces a [`BatchReport`] in input order.
//!
//! - **[`DeviceClientRegistry`]**: explicit owner of the device list and
//!   the lazily built [`DeviceClient`]s for a batch.

pub mod applier;
pub mod batch;
pub mod client;
pub mod config;
mod convert;
pub mod error;
pub mod export;
pub mod matcher;
pub mod model;
pub mod onvif;
pub mod probe;
pub mod validator;

// ── Primary re-exports ──────────────────────────────────────────────
pub use applier::ConfigApplier;
pub use batch::{BatchEvent, BatchOrchestrator, ProgressFn};
pub use client::{DeviceClient, DeviceClientFactory, DeviceClientRegistry, Discovery};
pub use config::{
    ApplyPolicy, BatchConfig, EngineConfig, FrameRatePolicy, LOOSE_RATIO_TOLERANCE,
    STRICT_RATIO_TOLERANCE, ValidationPolicy,
};
pub use error::{CoreError, ErrorClass};
pub use matcher::{ResolutionMatcher, match_resolution};
pub use onvif::OnvifClientFactory;
pub use probe::{FfprobeProbe, StreamProbe};
pub use validator::StreamValidator;

pub use model::{
    ApplyResult, BatchEntry, BatchMode, BatchReport, BatchSummary, ConfigRole, Device,
    DeviceCheck, DeviceOutcome, EncoderCapabilities, EncoderConfig, Encoding, Issue, IssueField,
    Protocol, Reachability, Resolution, Severity, StreamInfo, TaggedConfig, ValidationOutcome,
    ValidationResult, ValueRange,
};
