#![allow(clippy::unwrap_used)]
// Integration tests for `Media2Client` (Media2 ver20) using wiremock.

use secrecy::SecretString;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use camfleet_api::{Credentials, Media2Client, ServicePaths, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, Media2Client) {
    let server = MockServer::start().await;
    let root = Url::parse(&format!("{}/", server.uri())).unwrap();
    let creds = Credentials::new("operator", SecretString::from("pw".to_string()));
    let client = Media2Client::new(
        &root,
        &ServicePaths::under("/vendor"),
        Some(creds),
        &TransportConfig::default(),
    )
    .unwrap();
    (server, client)
}

fn soap_ok(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(format!(
        r#"<?xml version="1.0"?><SOAP-ENV:Envelope xmlns:SOAP-ENV="http://www.w3.org/2003/05/soap-envelope"><SOAP-ENV:Body>{body}</SOAP-ENV:Body></SOAP-ENV:Envelope>"#
    ))
}

const MEDIA2_PATH: &str = "/vendor/onvif/media2_service";

const CONFIGURATION: &str = r#"<tr2:Configurations token="VideoEncoderToken_1" GovLength="50" Profile="Main">
    <tt:Name>VideoEncoder_1</tt:Name><tt:UseCount>1</tt:UseCount>
    <tt:Encoding>H265</tt:Encoding>
    <tt:Resolution><tt:Width>2560</tt:Width><tt:Height>1440</tt:Height></tt:Resolution>
    <tt:RateControl ConstantBitRate="false"><tt:FrameRateLimit>20.000000</tt:FrameRateLimit><tt:BitrateLimit>4096</tt:BitrateLimit></tt:RateControl>
    <tt:Quality>3</tt:Quality>
  </tr2:Configurations>"#;

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_profiles_reads_encoder_binding() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(MEDIA2_PATH))
        .and(body_string_contains("<Type>All</Type>"))
        .and(body_string_contains("http://www.onvif.org/ver20/media/wsdl"))
        .respond_with(soap_ok(
            r#"<tr2:GetProfilesResponse><tr2:Profiles token="Profile_1" fixed="true"><tr2:Name>main</tr2:Name>
                <tr2:Configurations><tr2:VideoSource token="VideoSource_1"/><tr2:VideoEncoder token="VideoEncoderToken_1"><tt:Name>x</tt:Name></tr2:VideoEncoder></tr2:Configurations>
              </tr2:Profiles></tr2:GetProfilesResponse>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let profiles = client.get_profiles().await.unwrap();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].token, "Profile_1");
    assert_eq!(
        profiles[0].video_encoder_token.as_deref(),
        Some("VideoEncoderToken_1")
    );
}

#[tokio::test]
async fn test_get_video_encoder_configurations() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(MEDIA2_PATH))
        .and(body_string_contains("<GetVideoEncoderConfigurations"))
        .respond_with(soap_ok(&format!(
            "<tr2:GetVideoEncoderConfigurationsResponse>{CONFIGURATION}</tr2:GetVideoEncoderConfigurationsResponse>"
        )))
        .mount(&server)
        .await;

    let configs = client
        .get_video_encoder_configurations(None)
        .await
        .unwrap();
    assert_eq!(configs.len(), 1);
    let cfg = &configs[0];
    assert_eq!(cfg.token, "VideoEncoderToken_1");
    assert_eq!(cfg.encoding, "H265");
    assert_eq!(cfg.gov_length, Some(50));
    assert_eq!(cfg.profile.as_deref(), Some("Main"));
    assert!((cfg.frame_rate_limit() - 20.0).abs() < f64::EPSILON);
    assert_eq!(cfg.bitrate_limit(), 4096);
    assert_eq!(
        cfg.rate_control.as_ref().and_then(|rc| rc.constant_bit_rate),
        Some(false)
    );
}

#[tokio::test]
async fn test_set_sends_attributes() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(MEDIA2_PATH))
        .and(body_string_contains(
            r#"<Configuration token="VideoEncoderToken_1" GovLength="50" Profile="Main">"#,
        ))
        .and(body_string_contains("<tt:Width>1280</tt:Width>"))
        .and(body_string_contains(r#"<tt:RateControl ConstantBitRate="false">"#))
        .respond_with(soap_ok("<tr2:SetVideoEncoderConfigurationResponse/>"))
        .expect(1)
        .mount(&server)
        .await;

    let mut cfg = camfleet_api::VideoEncoderConfiguration {
        token: "VideoEncoderToken_1".into(),
        gov_length: Some(50),
        profile: Some("Main".into()),
        encoding: "H264".into(),
        rate_control: Some(camfleet_api::RateControl {
            frame_rate_limit: 15.0,
            encoding_interval: None,
            bitrate_limit: 1024,
            constant_bit_rate: Some(false),
        }),
        ..Default::default()
    };
    cfg.resolution.width = 1280;
    cfg.resolution.height = 720;

    client.set_video_encoder_configuration(&cfg).await.unwrap();
}

#[tokio::test]
async fn test_options_per_encoding() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(MEDIA2_PATH))
        .and(body_string_contains("<GetVideoEncoderConfigurationOptions"))
        .respond_with(soap_ok(
            r#"<tr2:GetVideoEncoderConfigurationOptionsResponse>
                <tr2:Options GovLengthRange="1 250" FrameRatesSupported="30 25 15 10 5" ProfilesSupported="Main">
                  <tt:Encoding>H264</tt:Encoding>
                  <tt:QualityRange><tt:Min>0</tt:Min><tt:Max>5</tt:Max></tt:QualityRange>
                  <tt:ResolutionsAvailable><tt:Width>1920</tt:Width><tt:Height>1080</tt:Height></tt:ResolutionsAvailable>
                  <tt:ResolutionsAvailable><tt:Width>1280</tt:Width><tt:Height>720</tt:Height></tt:ResolutionsAvailable>
                  <tt:BitrateRange><tt:Min>32</tt:Min><tt:Max>16384</tt:Max></tt:BitrateRange>
                </tr2:Options>
                <tr2:Options FrameRatesSupported="25 1">
                  <tt:Encoding>JPEG</tt:Encoding>
                  <tt:ResolutionsAvailable><tt:Width>640</tt:Width><tt:Height>360</tt:Height></tt:ResolutionsAvailable>
                </tr2:Options>
              </tr2:GetVideoEncoderConfigurationOptionsResponse>"#,
        ))
        .mount(&server)
        .await;

    let options = client
        .get_video_encoder_configuration_options("VideoEncoderToken_1")
        .await
        .unwrap();
    assert_eq!(options.len(), 2);
    assert_eq!(options[0].encoding, "H264");
    assert_eq!(options[0].resolutions.len(), 2);
    assert_eq!(options[0].frame_rate_range.map(|r| (r.min, r.max)), Some((5, 30)));
    assert_eq!(options[1].encoding, "JPEG");
    assert_eq!(options[1].bitrate_range, None);
}

#[tokio::test]
async fn test_options_keep_per_codec_resolution_lists() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(MEDIA2_PATH))
        .and(body_string_contains("<GetVideoEncoderConfigurationOptions"))
        .respond_with(soap_ok(
            r#"<tr2:GetVideoEncoderConfigurationOptionsResponse>
                <tr2:Options FrameRatesSupported="30 15">
                  <tt:Encoding>H264</tt:Encoding>
                  <tt:ResolutionsAvailable><tt:Width>1920</tt:Width><tt:Height>1080</tt:Height></tt:ResolutionsAvailable>
                </tr2:Options>
                <tr2:Options FrameRatesSupported="20 10">
                  <tt:Encoding>H265</tt:Encoding>
                  <tt:ResolutionsAvailable><tt:Width>2560</tt:Width><tt:Height>1440</tt:Height></tt:ResolutionsAvailable>
                </tr2:Options>
              </tr2:GetVideoEncoderConfigurationOptionsResponse>"#,
        ))
        .mount(&server)
        .await;

    let options = client
        .get_video_encoder_configuration_options("VideoEncoderToken_1")
        .await
        .unwrap();
    let h265 = options.iter().find(|o| o.encoding == "H265").unwrap();
    assert_eq!(
        h265.resolutions.iter().map(|r| (r.width, r.height)).collect::<Vec<_>>(),
        vec![(2560, 1440)]
    );
    assert_eq!(h265.frame_rate_range.map(|r| (r.min, r.max)), Some((10, 20)));
    assert_eq!(options[0].resolutions[0].width, 1920);
}

#[tokio::test]
async fn test_get_stream_uri() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(MEDIA2_PATH))
        .and(body_string_contains("<Protocol>RTSP</Protocol>"))
        .respond_with(soap_ok(
            "<tr2:GetStreamUriResponse><tr2:Uri>rtsp://10.0.0.9/stream1</tr2:Uri></tr2:GetStreamUriResponse>",
        ))
        .mount(&server)
        .await;

    let uri = client.get_stream_uri("Profile_1").await.unwrap();
    assert_eq!(uri, "rtsp://10.0.0.9/stream1");
}

#[tokio::test]
async fn test_empty_stream_uri_is_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(MEDIA2_PATH))
        .respond_with(soap_ok(
            "<tr2:GetStreamUriResponse><tr2:Uri></tr2:Uri></tr2:GetStreamUriResponse>",
        ))
        .mount(&server)
        .await;

    assert!(client.get_stream_uri("Profile_1").await.is_err());
}
