// ── Per-device configuration apply ──
//
// Discover → read capabilities and current config → match resolution →
// merge → idempotence check → write → stream URL. The primary protocol is
// tried first; if it is unusable the whole sequence is retried once on the
// fallback protocol with a reduced configuration, then verified by
// re-reading what the device stored.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing::{debug, info, warn};
use url::Url;

use camfleet_api::Credentials;

use crate::client::{DeviceClient, DeviceClientRegistry};
use crate::config::ApplyPolicy;
use crate::error::CoreError;
use crate::matcher::ResolutionMatcher;
use crate::model::{
    ApplyResult, ConfigRole, Device, DeviceCheck, EncoderCapabilities, EncoderConfig, Protocol,
    Resolution, TaggedConfig,
};

// ── Bitrate heuristic ───────────────────────────────────────────────

const HIGH_BITRATE_KBPS: u32 = 8192;
const MEDIUM_BITRATE_KBPS: u32 = 4096;
const LOW_BITRATE_KBPS: u32 = 2048;

/// Default bitrate for a resolution when nobody supplied one.
pub fn default_bitrate_kbps(resolution: Resolution) -> u32 {
    let area = resolution.area();
    if area >= Resolution::new(1920, 1080).area() {
        HIGH_BITRATE_KBPS
    } else if area >= Resolution::new(1280, 720).area() {
        MEDIUM_BITRATE_KBPS
    } else {
        LOW_BITRATE_KBPS
    }
}

fn first_set(values: &[u32]) -> u32 {
    values.iter().copied().find(|&v| v > 0).unwrap_or(0)
}

/// Merge `desired` over `current` for the primary path.
///
/// Unset fields inherit from `current`. Bitrate carries over only while the
/// resolution stays the same; otherwise it is derived from the new pixel
/// count. Advertised ranges clamp the result.
pub fn merge_config(
    desired: &EncoderConfig,
    current: &EncoderConfig,
    caps: &EncoderCapabilities,
    resolution: Resolution,
) -> EncoderConfig {
    let mut frame_rate = first_set(&[desired.frame_rate, current.frame_rate]);
    let mut bitrate = if desired.bitrate_kbps > 0 {
        desired.bitrate_kbps
    } else if current.bitrate_kbps > 0 && current.resolution == resolution {
        current.bitrate_kbps
    } else {
        default_bitrate_kbps(resolution)
    };
    let mut quality = first_set(&[desired.quality, current.quality]);

    if let Some(range) = caps.frame_rate_range.filter(|_| frame_rate > 0) {
        frame_rate = range.clamp(frame_rate);
    }
    if let Some(range) = caps.bitrate_range {
        bitrate = range.clamp(bitrate);
    }
    if let Some(range) = caps.quality_range.filter(|_| quality > 0) {
        quality = range.clamp(quality);
    }

    EncoderConfig {
        resolution,
        quality,
        frame_rate,
        bitrate_kbps: bitrate,
        encoding: desired.encoding.or(current.encoding),
    }
}

/// Reduced configuration for the fallback path: no bitrate heuristic, and
/// a conservative frame rate when neither side supplies one.
pub fn reduced_config(
    desired: &EncoderConfig,
    current: &EncoderConfig,
    caps: &EncoderCapabilities,
    resolution: Resolution,
    fallback_frame_rate: u32,
) -> EncoderConfig {
    let mut frame_rate = first_set(&[desired.frame_rate, current.frame_rate, fallback_frame_rate]);
    if let Some(range) = caps.frame_rate_range.filter(|_| frame_rate > 0) {
        frame_rate = range.clamp(frame_rate);
    }
    EncoderConfig {
        resolution,
        quality: first_set(&[desired.quality, current.quality]),
        frame_rate,
        bitrate_kbps: first_set(&[desired.bitrate_kbps, current.bitrate_kbps]),
        encoding: desired.encoding.or(current.encoding),
    }
}

/// Whether writing `applied` would change nothing the caller asked for.
pub fn is_unchanged(current: &EncoderConfig, applied: &EncoderConfig, desired: &EncoderConfig) -> bool {
    current.resolution == applied.resolution
        && current.frame_rate == applied.frame_rate
        && (desired.bitrate_kbps == 0 || current.bitrate_kbps == applied.bitrate_kbps)
        && (desired.encoding.is_none() || current.encoding == desired.encoding)
}

/// Embed credentials into a stream URL that does not already carry them.
pub fn embed_credentials(raw: &str, credentials: &Credentials) -> String {
    if credentials.is_empty() {
        return raw.to_owned();
    }
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_owned();
    };
    if !url.username().is_empty() {
        return raw.to_owned();
    }
    let password = credentials.password.expose_secret();
    if url.set_username(&credentials.username).is_err()
        || url
            .set_password((!password.is_empty()).then_some(password))
            .is_err()
    {
        return raw.to_owned();
    }
    url.to_string()
}

// ── Applier ─────────────────────────────────────────────────────────

/// What one device run is asked to do.
#[derive(Debug, Clone, Copy)]
enum Plan<'a> {
    Apply(&'a EncoderConfig),
    /// Read current settings and the stream URL; never write.
    Inspect,
}

/// Fallback state machine.
enum State {
    Discovering(Protocol),
    FallbackTriggered(CoreError),
    Done(Result<Outcome, (Protocol, CoreError)>),
}

#[derive(Debug)]
struct Outcome {
    protocol: Protocol,
    profile: String,
    applied: EncoderConfig,
    unchanged: bool,
    stream_url: String,
}

/// Applies a desired encoder configuration to one device at a time.
#[derive(Debug, Clone)]
pub struct ConfigApplier {
    registry: Arc<DeviceClientRegistry>,
    policy: ApplyPolicy,
    matcher: ResolutionMatcher,
}

impl ConfigApplier {
    pub fn new(registry: Arc<DeviceClientRegistry>, policy: ApplyPolicy) -> Self {
        Self {
            registry,
            matcher: ResolutionMatcher::new(policy.ratio_tolerance),
            policy,
        }
    }

    pub fn registry(&self) -> &Arc<DeviceClientRegistry> {
        &self.registry
    }

    /// Apply `desired` to `device`. Failures are captured in the result.
    pub async fn apply(&self, device: &Device, desired: &EncoderConfig) -> ApplyResult {
        if device.simulated {
            debug!(device = %device.id, "simulated device, skipping network");
            return simulated_result(device, Some(*desired));
        }
        let result = self.run(device, Plan::Apply(desired)).await;
        self.finish(device, result, Some(desired))
    }

    /// Discover the current configuration and stream URL without writing.
    pub async fn inspect(&self, device: &Device) -> ApplyResult {
        if device.simulated {
            return simulated_result(device, None);
        }
        let result = self.run(device, Plan::Inspect).await;
        self.finish(device, result, None)
    }

    /// Read-only health check of one device: reachability, tokens, current
    /// settings, advertised options and stream URL.
    ///
    /// Falls back to the secondary protocol under the same rule as `apply`.
    /// A device that answers discovery but fails a later read is `partial`.
    pub async fn check(&self, device: &Device) -> DeviceCheck {
        let mut check = DeviceCheck::new(device);
        if device.simulated {
            return check;
        }
        let mut protocol = Protocol::Primary;
        loop {
            check.protocol = Some(protocol);
            match self.check_on(device, protocol, &mut check).await {
                Ok(()) => break,
                Err(e)
                    if protocol == Protocol::Primary
                        && self.policy.fallback_enabled
                        && e.triggers_fallback() =>
                {
                    warn!(
                        device = %device.id,
                        error = %e,
                        "primary protocol unusable, checking fallback"
                    );
                    protocol = Protocol::Fallback;
                }
                Err(e) => {
                    warn!(device = %device.id, %protocol, error = %e, "device check failed");
                    check.unreachable(&e, device);
                    break;
                }
            }
        }
        info!(device = %device.id, status = %check.status, "device checked");
        check
    }

    /// Errors only when discovery fails; later read failures mark the
    /// check partial and stop.
    async fn check_on(
        &self,
        device: &Device,
        protocol: Protocol,
        check: &mut DeviceCheck,
    ) -> Result<(), CoreError> {
        let client = self.registry.client(&device.id, protocol)?;
        let discovery = client.discover_profiles_and_configs().await?;
        let (profile, config) = discovery.primary_pair()?;
        check.profile_token = Some(profile.to_owned());
        check.config_token = Some(config.to_owned());

        let current = match client.get_current_config(config).await {
            Ok(current) => current,
            Err(e) => {
                check.partial(&e);
                return Ok(());
            }
        };
        check.current = Some(current);

        match client.get_capabilities(profile, config, current.encoding).await {
            Ok(caps) => check.capabilities = Some(caps),
            Err(e) => {
                check.partial(&e);
                return Ok(());
            }
        }

        match client.get_stream_url(profile).await {
            Ok(url) => check.stream_url = Some(url),
            Err(e) => check.partial(&e),
        }
        Ok(())
    }

    async fn run(&self, device: &Device, plan: Plan<'_>) -> Result<Outcome, (Protocol, CoreError)> {
        let mut state = State::Discovering(Protocol::Primary);
        loop {
            state = match state {
                State::Discovering(protocol) => match self.attempt(device, protocol, plan).await {
                    Ok(outcome) => State::Done(Ok(outcome)),
                    Err(e)
                        if protocol == Protocol::Primary
                            && self.policy.fallback_enabled
                            && e.triggers_fallback() =>
                    {
                        State::FallbackTriggered(e)
                    }
                    Err(e) => State::Done(Err((protocol, e))),
                },
                State::FallbackTriggered(cause) => {
                    warn!(
                        device = %device.id,
                        error = %cause,
                        "primary protocol unusable, trying fallback"
                    );
                    State::Discovering(Protocol::Fallback)
                }
                State::Done(result) => return result,
            };
        }
    }

    async fn attempt(
        &self,
        device: &Device,
        protocol: Protocol,
        plan: Plan<'_>,
    ) -> Result<Outcome, CoreError> {
        let client = self.registry.client(&device.id, protocol)?;
        let discovery = client.discover_profiles_and_configs().await?;
        let (profile, config) = discovery.primary_pair()?;
        debug!(device = %device.id, %protocol, profile, config, "discovered");

        let (applied, unchanged) = match plan {
            Plan::Inspect => (client.get_current_config(config).await?, true),
            Plan::Apply(desired) => {
                self.reconcile(client.as_ref(), device, config, profile, desired)
                    .await?
            }
        };

        let raw_url = client.get_stream_url(profile).await?;
        Ok(Outcome {
            protocol,
            profile: profile.to_owned(),
            applied,
            unchanged,
            stream_url: embed_credentials(&raw_url, &device.credentials),
        })
    }

    async fn reconcile(
        &self,
        client: &dyn DeviceClient,
        device: &Device,
        config: &str,
        profile: &str,
        desired: &EncoderConfig,
    ) -> Result<(EncoderConfig, bool), CoreError> {
        let protocol = client.protocol();
        let current = client.get_current_config(config).await?;
        debug!(device = %device.id, config = %TaggedConfig::new(ConfigRole::Current, current));
        let caps = client
            .get_capabilities(profile, config, desired.encoding.or(current.encoding))
            .await?;

        let mut resolution = self.matcher.best_match(desired.resolution, &caps.resolutions);
        if resolution.is_zero() {
            // Nothing advertised; ask for what the caller wants.
            resolution = desired.resolution;
        }

        let applied = match protocol {
            Protocol::Primary => merge_config(desired, &current, &caps, resolution),
            Protocol::Fallback => reduced_config(
                desired,
                &current,
                &caps,
                resolution,
                self.policy.fallback_frame_rate,
            ),
        };

        if is_unchanged(&current, &applied, desired) {
            info!(device = %device.id, %protocol, "configuration already in place");
            return Ok((current, true));
        }

        client.set_config(config, &applied).await?;
        info!(
            device = %device.id,
            %protocol,
            config = %TaggedConfig::new(ConfigRole::Applied, applied),
            "configuration written"
        );

        if protocol == Protocol::Fallback {
            let stored = client.get_current_config(config).await?;
            let fps_ok = applied.frame_rate == 0 || stored.frame_rate == applied.frame_rate;
            if stored.resolution != applied.resolution || !fps_ok {
                return Err(CoreError::VerificationFailed {
                    expected: applied.to_string(),
                    actual: stored.to_string(),
                });
            }
        }

        Ok((applied, false))
    }

    fn finish(
        &self,
        device: &Device,
        result: Result<Outcome, (Protocol, CoreError)>,
        desired: Option<&EncoderConfig>,
    ) -> ApplyResult {
        match result {
            Ok(o) => ApplyResult {
                device_id: device.id.clone(),
                success: true,
                unchanged: o.unchanged,
                protocol: Some(o.protocol),
                profile_token: Some(o.profile),
                resolution_adjusted: desired
                    .is_some_and(|d| d.resolution != o.applied.resolution),
                applied_config: Some(o.applied),
                stream_url: Some(o.stream_url),
                error_class: None,
                error_message: None,
                hint: None,
            },
            Err((protocol, e)) => {
                let class = e.class();
                warn!(device = %device.id, %protocol, error = %e, class = %class, "apply failed");
                let mut failed = ApplyResult::failed(&device.id, &e);
                failed.protocol = Some(protocol);
                failed.hint = class.operator_hint(&device.host, device.port);
                failed
            }
        }
    }
}

fn simulated_result(device: &Device, desired: Option<EncoderConfig>) -> ApplyResult {
    ApplyResult {
        device_id: device.id.clone(),
        success: true,
        unchanged: desired.is_none(),
        protocol: None,
        profile_token: None,
        applied_config: desired,
        resolution_adjusted: false,
        stream_url: None,
        error_class: None,
        error_message: None,
        hint: None,
    }
}
