// ── Batch orchestration ──
//
// Apply to every device with bounded parallelism, settle once, then
// validate every device whose apply succeeded. Per-device failures are
// captured in that device's entry; only an unusable request fails the
// whole batch. Results keep input order.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{StreamExt, stream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::applier::ConfigApplier;
use crate::client::DeviceClientRegistry;
use crate::config::{BatchConfig, EngineConfig};
use crate::error::CoreError;
use crate::model::{
    ApplyResult, BatchEntry, BatchMode, BatchReport, BatchSummary, EncoderConfig,
    ValidationOutcome, ValidationResult,
};
use crate::probe::StreamProbe;
use crate::validator::StreamValidator;

/// Progress notifications, one per phase transition or finished device.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Started {
        batch_id: Uuid,
        total: usize,
    },
    Applied {
        device_id: String,
        success: bool,
    },
    Settling {
        delay: Duration,
    },
    Validated {
        device_id: String,
        outcome: ValidationOutcome,
    },
    Finished {
        summary: BatchSummary,
    },
}

pub type ProgressFn = Arc<dyn Fn(&BatchEvent) + Send + Sync>;

/// Apply phase output for one device.
struct Applied {
    device_id: String,
    address: String,
    simulated: bool,
    apply: ApplyResult,
}

/// Drives apply and validate across a set of devices.
pub struct BatchOrchestrator {
    applier: ConfigApplier,
    validator: StreamValidator,
    config: BatchConfig,
    progress: Option<ProgressFn>,
    cancel: CancellationToken,
}

impl BatchOrchestrator {
    pub fn new(applier: ConfigApplier, validator: StreamValidator, config: BatchConfig) -> Self {
        Self {
            applier,
            validator,
            config,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Wire an applier and validator from one engine configuration.
    pub fn from_engine(
        registry: Arc<DeviceClientRegistry>,
        probe: Arc<dyn StreamProbe>,
        engine: &EngineConfig,
    ) -> Self {
        Self::new(
            ConfigApplier::new(registry, engine.apply),
            StreamValidator::new(probe, engine.validation),
            engine.batch,
        )
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Cancelling this token stops dispatching new device work. In-flight
    /// calls finish or time out on their own.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn emit(&self, event: &BatchEvent) {
        if let Some(progress) = &self.progress {
            progress(event);
        }
    }

    /// Apply `desired` to `device_ids`, settle, and validate.
    pub async fn run(
        &self,
        device_ids: &[String],
        desired: &EncoderConfig,
    ) -> Result<BatchReport, CoreError> {
        self.run_mode(device_ids, desired, BatchMode::ApplyAndValidate)
            .await
    }

    pub async fn run_mode(
        &self,
        device_ids: &[String],
        desired: &EncoderConfig,
        mode: BatchMode,
    ) -> Result<BatchReport, CoreError> {
        if device_ids.is_empty() {
            return Err(CoreError::ValidationFailed {
                message: "no device ids given".into(),
            });
        }
        if desired.resolution.is_zero() {
            return Err(CoreError::ValidationFailed {
                message: format!("desired resolution {} is not usable", desired.resolution),
            });
        }

        let mut seen = HashSet::new();
        let ids: Vec<&str> = device_ids
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect();

        let batch_id = Uuid::new_v4();
        let started_at = Utc::now();
        let token = self.cancel.child_token();
        let deadline = self.config.timeout.map(|timeout| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                token.cancel();
            })
        });

        info!(%batch_id, %mode, total = ids.len(), desired = %desired, "batch started");
        self.emit(&BatchEvent::Started {
            batch_id,
            total: ids.len(),
        });

        let concurrency = self.config.concurrency.max(1);

        // ── Phase 1: apply ──
        let applied: Vec<Applied> = stream::iter(ids)
            .map(|id| self.apply_one(id, desired, mode, &token))
            .buffered(concurrency)
            .collect()
            .await;

        // ── Phase 2: settle ──
        let wrote = applied
            .iter()
            .any(|a| a.apply.success && !a.apply.unchanged && !a.simulated);
        if wrote && !self.config.settle_delay.is_zero() && !token.is_cancelled() {
            let delay = self.config.settle_delay;
            debug!(%batch_id, ?delay, "settling");
            self.emit(&BatchEvent::Settling { delay });
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = token.cancelled() => {}
            }
        }

        // ── Phase 3: validate ──
        let entries: Vec<BatchEntry> = stream::iter(applied)
            .map(|a| self.validate_one(a, desired, &token))
            .buffered(concurrency)
            .collect()
            .await;

        if let Some(handle) = deadline {
            handle.abort();
        }

        let cancelled = token.is_cancelled();
        let summary = BatchSummary::from_entries(&entries);
        if cancelled {
            warn!(%batch_id, "batch cancelled before all devices were processed");
        }
        info!(
            %batch_id,
            applied = summary.applied,
            apply_failed = summary.apply_failed,
            cancelled = summary.cancelled,
            passed = summary.validation_passed,
            warned = summary.validation_warned,
            failed = summary.validation_failed,
            "batch finished"
        );
        self.emit(&BatchEvent::Finished { summary });

        Ok(BatchReport {
            batch_id,
            mode,
            started_at,
            finished_at: Utc::now(),
            desired: *desired,
            cancelled,
            entries,
            summary,
        })
    }

    async fn apply_one(
        &self,
        id: &str,
        desired: &EncoderConfig,
        mode: BatchMode,
        token: &CancellationToken,
    ) -> Applied {
        let device = self.applier.registry().device(id);
        let address = device
            .as_ref()
            .map_or_else(|| "Unknown".to_owned(), |d| d.address());
        let simulated = device.as_ref().is_some_and(|d| d.simulated);

        let apply = if token.is_cancelled() {
            ApplyResult::failed(id, &CoreError::Cancelled)
        } else {
            match &device {
                None => ApplyResult::failed(
                    id,
                    &CoreError::DeviceNotFound {
                        identifier: id.to_owned(),
                    },
                ),
                Some(device) => match mode {
                    BatchMode::ApplyAndValidate => self.applier.apply(device, desired).await,
                    BatchMode::ValidateOnly => self.applier.inspect(device).await,
                },
            }
        };

        self.emit(&BatchEvent::Applied {
            device_id: id.to_owned(),
            success: apply.success,
        });
        Applied {
            device_id: id.to_owned(),
            address,
            simulated,
            apply,
        }
    }

    async fn validate_one(
        &self,
        applied: Applied,
        desired: &EncoderConfig,
        token: &CancellationToken,
    ) -> BatchEntry {
        let validation = if !applied.apply.success || token.is_cancelled() {
            None
        } else if applied.simulated {
            Some(ValidationResult::synthesized(&applied.device_id, *desired))
        } else if let Some(url) = applied.apply.stream_url.as_deref() {
            Some(
                self.validator
                    .validate(&applied.device_id, url, desired)
                    .await,
            )
        } else {
            None
        };

        if let Some(v) = &validation {
            self.emit(&BatchEvent::Validated {
                device_id: applied.device_id.clone(),
                outcome: v.outcome(),
            });
        }

        BatchEntry {
            device_id: applied.device_id,
            address: applied.address,
            apply: applied.apply,
            validation,
        }
    }
}

impl std::fmt::Debug for BatchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("applier", &self.applier)
            .field("validator", &self.validator)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
