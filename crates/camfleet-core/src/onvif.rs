// ── ONVIF-backed device clients ──
//
// Primary = Media ver10, fallback = Media2 ver20. Both are thin adapters
// over camfleet-api; every protocol error is attributed to the apply stage
// it happened in so classification and fallback decisions stay in core.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use camfleet_api::{
    Error as ApiError, Media2Client, MediaClient, ServicePaths, TransportConfig,
    VideoEncoderConfiguration,
};
use tracing::debug;

use crate::client::{DeviceClient, DeviceClientFactory, Discovery};
use crate::convert;
use crate::error::{CoreError, Stage};
use crate::model::{Device, EncoderCapabilities, EncoderConfig, Encoding, Protocol};

fn staged(stage: Stage, timeout: Duration) -> impl Fn(ApiError) -> CoreError {
    move |e| CoreError::from_api(e, timeout).in_stage(stage)
}

/// Profiles bound to an encoder first, so `(profiles[0], configs[0])`
/// always belong together.
fn discovery_from(profiles: &[camfleet_api::Profile]) -> Discovery {
    let (bound, unbound): (Vec<_>, Vec<_>) = profiles
        .iter()
        .partition(|p| p.video_encoder_token.is_some());
    let configs: Vec<String> = bound
        .iter()
        .filter_map(|p| p.video_encoder_token.clone())
        .collect();
    let profiles = bound
        .iter()
        .chain(unbound.iter())
        .map(|p| p.token.clone())
        .collect();
    Discovery { profiles, configs }
}

fn require_usable(discovery: Discovery) -> Result<Discovery, CoreError> {
    if discovery.profiles.is_empty() || discovery.configs.is_empty() {
        Err(CoreError::NoUsableProfiles)
    } else {
        Ok(discovery)
    }
}

// ── Factory ─────────────────────────────────────────────────────────

/// Creates Media / Media2 clients for real cameras.
#[derive(Debug, Clone, Default)]
pub struct OnvifClientFactory {
    transport: TransportConfig,
}

impl OnvifClientFactory {
    pub fn new(transport: TransportConfig) -> Self {
        Self { transport }
    }
}

impl DeviceClientFactory for OnvifClientFactory {
    fn create(
        &self,
        device: &Device,
        protocol: Protocol,
    ) -> Result<Arc<dyn DeviceClient>, CoreError> {
        let root = device.root_url()?;
        let paths = device
            .base_path
            .as_deref()
            .filter(|p| !p.trim_matches('/').is_empty())
            .map_or_else(ServicePaths::default, ServicePaths::under);
        let credentials = Some(device.credentials.clone());
        let client: Arc<dyn DeviceClient> = match protocol {
            Protocol::Primary => Arc::new(MediaDeviceClient::new(
                MediaClient::new(&root, &paths, credentials, &self.transport)
                    .map_err(|e| CoreError::from_api(e, self.transport.timeout))?,
                &self.transport,
            )),
            Protocol::Fallback => Arc::new(Media2DeviceClient::new(
                Media2Client::new(&root, &paths, credentials, &self.transport)
                    .map_err(|e| CoreError::from_api(e, self.transport.timeout))?,
                &self.transport,
            )),
        };
        Ok(client)
    }
}

// ── Media ver10 ─────────────────────────────────────────────────────

pub struct MediaDeviceClient {
    media: MediaClient,
    timeout: Duration,
}

impl MediaDeviceClient {
    pub fn new(media: MediaClient, transport: &TransportConfig) -> Self {
        Self {
            media,
            timeout: transport.timeout,
        }
    }

    fn staged(&self, stage: Stage) -> impl Fn(ApiError) -> CoreError {
        staged(stage, self.timeout)
    }

    async fn read_wire(&self, config: &str) -> Result<VideoEncoderConfiguration, ApiError> {
        self.media.get_video_encoder_configuration(config).await
    }
}

#[async_trait]
impl DeviceClient for MediaDeviceClient {
    fn protocol(&self) -> Protocol {
        Protocol::Primary
    }

    async fn discover_profiles_and_configs(&self) -> Result<Discovery, CoreError> {
        let profiles = self
            .media
            .get_profiles()
            .await
            .map_err(self.staged(Stage::Discovery))?;
        require_usable(discovery_from(&profiles))
    }

    async fn get_capabilities(
        &self,
        profile: &str,
        config: &str,
        encoding: Option<Encoding>,
    ) -> Result<EncoderCapabilities, CoreError> {
        let options = self
            .media
            .get_video_encoder_configuration_options(config, profile)
            .await
            .map_err(self.staged(Stage::Capabilities))?;
        Ok(convert::capabilities(&options, encoding))
    }

    async fn get_current_config(&self, config: &str) -> Result<EncoderConfig, CoreError> {
        let wire = self
            .read_wire(config)
            .await
            .map_err(self.staged(Stage::ReadConfig))?;
        Ok(convert::encoder_config(&wire))
    }

    async fn set_config(&self, config: &str, desired: &EncoderConfig) -> Result<(), CoreError> {
        let mut wire = self
            .read_wire(config)
            .await
            .map_err(self.staged(Stage::WriteConfig))?;
        convert::apply_to_wire(&mut wire, desired);
        debug!(config, resolution = %desired.resolution, "SetVideoEncoderConfiguration");
        self.media
            .set_video_encoder_configuration(&wire)
            .await
            .map_err(self.staged(Stage::WriteConfig))
    }

    async fn get_stream_url(&self, profile: &str) -> Result<String, CoreError> {
        self.media
            .get_stream_uri(profile)
            .await
            .map_err(self.staged(Stage::StreamUrl))
    }
}

// ── Media2 ver20 ────────────────────────────────────────────────────

pub struct Media2DeviceClient {
    media2: Media2Client,
    timeout: Duration,
}

impl Media2DeviceClient {
    pub fn new(media2: Media2Client, transport: &TransportConfig) -> Self {
        Self {
            media2,
            timeout: transport.timeout,
        }
    }

    fn staged(&self, stage: Stage) -> impl Fn(ApiError) -> CoreError {
        staged(stage, self.timeout)
    }

    async fn read_wire(&self, config: &str) -> Result<VideoEncoderConfiguration, CoreError> {
        let configs = self
            .media2
            .get_video_encoder_configurations(Some(config))
            .await
            .map_err(|e| CoreError::from_api(e, self.timeout))?;
        configs
            .into_iter()
            .find(|c| c.token == config || c.token.is_empty())
            .ok_or_else(|| CoreError::Api {
                message: format!("encoder configuration {config} not reported by device"),
                status: None,
            })
    }
}

#[async_trait]
impl DeviceClient for Media2DeviceClient {
    fn protocol(&self) -> Protocol {
        Protocol::Fallback
    }

    async fn discover_profiles_and_configs(&self) -> Result<Discovery, CoreError> {
        let profiles = self
            .media2
            .get_profiles()
            .await
            .map_err(self.staged(Stage::Discovery))?;
        let mut discovery = discovery_from(&profiles);
        if discovery.configs.is_empty() && !discovery.profiles.is_empty() {
            // Some firmware omits encoder bindings from GetProfiles; fall
            // back to listing configurations directly.
            let configs = self
                .media2
                .get_video_encoder_configurations(None)
                .await
                .map_err(self.staged(Stage::Discovery))?;
            discovery.configs = configs.into_iter().map(|c| c.token).collect();
        }
        require_usable(discovery)
    }

    async fn get_capabilities(
        &self,
        _profile: &str,
        config: &str,
        encoding: Option<Encoding>,
    ) -> Result<EncoderCapabilities, CoreError> {
        let options = self
            .media2
            .get_video_encoder_configuration_options(config)
            .await
            .map_err(self.staged(Stage::Capabilities))?;
        Ok(convert::capabilities(&options, encoding))
    }

    async fn get_current_config(&self, config: &str) -> Result<EncoderConfig, CoreError> {
        let wire = self
            .read_wire(config)
            .await
            .map_err(|e| e.in_stage(Stage::ReadConfig))?;
        Ok(convert::encoder_config(&wire))
    }

    async fn set_config(&self, config: &str, desired: &EncoderConfig) -> Result<(), CoreError> {
        let mut wire = self
            .read_wire(config)
            .await
            .map_err(|e| e.in_stage(Stage::WriteConfig))?;
        convert::apply_to_wire(&mut wire, desired);
        debug!(config, resolution = %desired.resolution, "Media2 SetVideoEncoderConfiguration");
        self.media2
            .set_video_encoder_configuration(&wire)
            .await
            .map_err(self.staged(Stage::WriteConfig))
    }

    async fn get_stream_url(&self, profile: &str) -> Result<String, CoreError> {
        self.media2
            .get_stream_uri(profile)
            .await
            .map_err(self.staged(Stage::StreamUrl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(token: &str, enc: Option<&str>) -> camfleet_api::Profile {
        camfleet_api::Profile {
            token: token.into(),
            name: None,
            video_encoder_token: enc.map(Into::into),
        }
    }

    #[test]
    fn bound_profiles_come_first() {
        let d = discovery_from(&[profile("p0", None), profile("p1", Some("e1"))]);
        assert_eq!(d.profiles, vec!["p1", "p0"]);
        assert_eq!(d.configs, vec!["e1"]);
        assert_eq!(d.primary_pair().ok(), Some(("p1", "e1")));
    }

    #[test]
    fn no_encoder_bindings_is_unusable() {
        let d = discovery_from(&[profile("p0", None)]);
        assert!(matches!(
            require_usable(d),
            Err(CoreError::NoUsableProfiles)
        ));
        assert!(matches!(
            require_usable(discovery_from(&[])),
            Err(CoreError::NoUsableProfiles)
        ));
    }
}
