// ── Domain model ──
//
// Canonical types the reconciliation engine reasons about. Protocol wire
// types from camfleet-api are converted into these at the `DeviceClient`
// boundary, so nothing past that point deals with raw encoding strings or
// SOAP tokens beyond opaque identifiers.

pub mod check;
pub mod device;
pub mod encoder;
pub mod report;
pub mod result;

// ── Re-exports ──────────────────────────────────────────────────────

pub use check::{DeviceCheck, Reachability};
pub use device::Device;
pub use encoder::{
    ConfigRole, EncoderCapabilities, EncoderConfig, Encoding, Resolution, TaggedConfig,
    ValueRange,
};
pub use report::{BatchEntry, BatchMode, BatchReport, BatchSummary, DeviceOutcome};
pub use result::{
    ApplyResult, Issue, IssueField, Protocol, Severity, StreamInfo, ValidationOutcome,
    ValidationResult, redact_url,
};
