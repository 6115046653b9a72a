// Media (ver10) and Media2 (ver20) service clients
//
// Each client owns a `SoapClient` bound to its service endpoint and
// implements the handful of encoder operations the reconciliation engine
// needs. Responses are picked apart with the namespace-agnostic helpers in
// `crate::xml`.

pub mod models;

use tracing::debug;
use url::Url;

use crate::auth::Credentials;
use crate::error::Error;
use crate::soap::{SoapClient, missing};
use crate::transport::TransportConfig;
use crate::xml::{self, escape};

use self::models::{EncoderOptions, Profile, VideoEncoderConfiguration};

const MEDIA_NS: &str = "http://www.onvif.org/ver10/media/wsdl";
const MEDIA2_NS: &str = "http://www.onvif.org/ver20/media/wsdl";

/// Service paths relative to the device root.
#[derive(Debug, Clone)]
pub struct ServicePaths {
    pub media: String,
    pub media2: String,
}

impl Default for ServicePaths {
    fn default() -> Self {
        Self {
            media: "/onvif/media_service".into(),
            media2: "/onvif/media2_service".into(),
        }
    }
}

impl ServicePaths {
    /// Prefix both service paths with `base` (e.g. `/cgi-bin`).
    pub fn under(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        let defaults = Self::default();
        Self {
            media: format!("{base}{}", defaults.media),
            media2: format!("{base}{}", defaults.media2),
        }
    }
}

fn endpoint(root: &Url, path: &str) -> Result<Url, Error> {
    Ok(root.join(path.trim_start_matches('/'))?)
}

// ── Media ver10 ─────────────────────────────────────────────────────

/// Client for the Media ver10 service (primary protocol).
#[derive(Debug, Clone)]
pub struct MediaClient {
    soap: SoapClient,
}

impl MediaClient {
    /// Create a client for the device rooted at `root` (e.g. `http://10.0.0.5:80/`).
    pub fn new(
        root: &Url,
        paths: &ServicePaths,
        credentials: Option<Credentials>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let soap = SoapClient::new(endpoint(root, &paths.media)?, credentials, transport)?;
        Ok(Self { soap })
    }

    pub fn from_soap(soap: SoapClient) -> Self {
        Self { soap }
    }

    pub fn endpoint(&self) -> &Url {
        self.soap.endpoint()
    }

    async fn call(&self, op: &str, inner: &str) -> Result<String, Error> {
        let action = format!("{MEDIA_NS}/{op}");
        let body = format!(r#"<{op} xmlns="{MEDIA_NS}">{inner}</{op}>"#);
        self.soap.call(&action, &body).await
    }

    /// `GetProfiles`: every media profile with its encoder configuration token.
    pub async fn get_profiles(&self) -> Result<Vec<Profile>, Error> {
        let body = self.call("GetProfiles", "").await?;
        let response = xml::find(&body, "GetProfilesResponse")
            .ok_or_else(|| missing("GetProfilesResponse", &body))?;
        let profiles: Vec<Profile> = response
            .children("Profiles")
            .iter()
            .filter_map(Profile::from_ver10)
            .collect();
        debug!(count = profiles.len(), "media profiles");
        Ok(profiles)
    }

    /// `GetVideoEncoderConfigurationOptions` for a (profile, configuration) pair.
    pub async fn get_video_encoder_configuration_options(
        &self,
        config_token: &str,
        profile_token: &str,
    ) -> Result<Vec<EncoderOptions>, Error> {
        let inner = format!(
            "<ConfigurationToken>{}</ConfigurationToken><ProfileToken>{}</ProfileToken>",
            escape(config_token),
            escape(profile_token)
        );
        let body = self
            .call("GetVideoEncoderConfigurationOptions", &inner)
            .await?;
        let options = xml::find(&body, "Options").ok_or_else(|| missing("Options", &body))?;
        Ok(EncoderOptions::from_ver10(&options))
    }

    /// `GetVideoEncoderConfiguration` for one configuration token.
    pub async fn get_video_encoder_configuration(
        &self,
        config_token: &str,
    ) -> Result<VideoEncoderConfiguration, Error> {
        let inner = format!(
            "<ConfigurationToken>{}</ConfigurationToken>",
            escape(config_token)
        );
        let body = self.call("GetVideoEncoderConfiguration", &inner).await?;
        let cfg = xml::find(&body, "Configuration")
            .ok_or_else(|| missing("Configuration", &body))?;
        Ok(VideoEncoderConfiguration::from_ver10(&cfg))
    }

    /// `SetVideoEncoderConfiguration` with `ForcePersistence=true`.
    pub async fn set_video_encoder_configuration(
        &self,
        config: &VideoEncoderConfiguration,
    ) -> Result<(), Error> {
        let inner = format!(
            "{}<ForcePersistence>true</ForcePersistence>",
            config.to_ver10_xml()
        );
        self.call("SetVideoEncoderConfiguration", &inner).await?;
        Ok(())
    }

    /// `GetStreamUri` for RTP-Unicast over RTSP.
    pub async fn get_stream_uri(&self, profile_token: &str) -> Result<String, Error> {
        let inner = format!(
            "<StreamSetup><tt:Stream>RTP-Unicast</tt:Stream><tt:Transport><tt:Protocol>RTSP</tt:Protocol></tt:Transport></StreamSetup><ProfileToken>{}</ProfileToken>",
            escape(profile_token)
        );
        let body = self.call("GetStreamUri", &inner).await?;
        xml::find(&body, "MediaUri")
            .and_then(|m| m.child_text("Uri"))
            .map(std::borrow::Cow::into_owned)
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| missing("MediaUri/Uri", &body))
    }
}

// ── Media2 ver20 ────────────────────────────────────────────────────

/// Client for the Media2 ver20 service (fallback protocol).
#[derive(Debug, Clone)]
pub struct Media2Client {
    soap: SoapClient,
}

impl Media2Client {
    pub fn new(
        root: &Url,
        paths: &ServicePaths,
        credentials: Option<Credentials>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let soap = SoapClient::new(endpoint(root, &paths.media2)?, credentials, transport)?;
        Ok(Self { soap })
    }

    pub fn from_soap(soap: SoapClient) -> Self {
        Self { soap }
    }

    pub fn endpoint(&self) -> &Url {
        self.soap.endpoint()
    }

    async fn call(&self, op: &str, inner: &str) -> Result<String, Error> {
        let action = format!("{MEDIA2_NS}/{op}");
        let body = format!(r#"<{op} xmlns="{MEDIA2_NS}">{inner}</{op}>"#);
        self.soap.call(&action, &body).await
    }

    /// `GetProfiles` with `Type=All` so encoder bindings are included.
    pub async fn get_profiles(&self) -> Result<Vec<Profile>, Error> {
        let body = self.call("GetProfiles", "<Type>All</Type>").await?;
        let response = xml::find(&body, "GetProfilesResponse")
            .ok_or_else(|| missing("GetProfilesResponse", &body))?;
        let profiles: Vec<Profile> = response
            .children("Profiles")
            .iter()
            .filter_map(Profile::from_ver20)
            .collect();
        debug!(count = profiles.len(), "media2 profiles");
        Ok(profiles)
    }

    /// `GetVideoEncoderConfigurations`, optionally narrowed to one token.
    pub async fn get_video_encoder_configurations(
        &self,
        config_token: Option<&str>,
    ) -> Result<Vec<VideoEncoderConfiguration>, Error> {
        let inner = config_token
            .map(|t| format!("<ConfigurationToken>{}</ConfigurationToken>", escape(t)))
            .unwrap_or_default();
        let body = self
            .call("GetVideoEncoderConfigurations", &inner)
            .await?;
        let response = xml::find(&body, "GetVideoEncoderConfigurationsResponse")
            .ok_or_else(|| missing("GetVideoEncoderConfigurationsResponse", &body))?;
        Ok(response
            .children("Configurations")
            .iter()
            .map(VideoEncoderConfiguration::from_ver20)
            .collect())
    }

    pub async fn get_video_encoder_configuration_options(
        &self,
        config_token: &str,
    ) -> Result<Vec<EncoderOptions>, Error> {
        let inner = format!(
            "<ConfigurationToken>{}</ConfigurationToken>",
            escape(config_token)
        );
        let body = self
            .call("GetVideoEncoderConfigurationOptions", &inner)
            .await?;
        let response = xml::find(&body, "GetVideoEncoderConfigurationOptionsResponse")
            .ok_or_else(|| missing("GetVideoEncoderConfigurationOptionsResponse", &body))?;
        Ok(response
            .children("Options")
            .iter()
            .map(EncoderOptions::from_ver20)
            .collect())
    }

    pub async fn set_video_encoder_configuration(
        &self,
        config: &VideoEncoderConfiguration,
    ) -> Result<(), Error> {
        self.call("SetVideoEncoderConfiguration", &config.to_ver20_xml())
            .await?;
        Ok(())
    }

    pub async fn get_stream_uri(&self, profile_token: &str) -> Result<String, Error> {
        let inner = format!(
            "<Protocol>RTSP</Protocol><ProfileToken>{}</ProfileToken>",
            escape(profile_token)
        );
        let body = self.call("GetStreamUri", &inner).await?;
        xml::find(&body, "GetStreamUriResponse")
            .and_then(|r| r.child_text("Uri"))
            .map(std::borrow::Cow::into_owned)
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| missing("Uri", &body))
    }
}
