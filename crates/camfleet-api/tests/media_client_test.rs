#![allow(clippy::unwrap_used)]
// Integration tests for `MediaClient` (Media ver10) using wiremock.

use secrecy::SecretString;
use url::Url;
use wiremock::matchers::{body_string_contains, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use camfleet_api::{Credentials, Error, MediaClient, ServicePaths, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, MediaClient) {
    let server = MockServer::start().await;
    let root = Url::parse(&server.uri()).unwrap();
    let creds = Credentials::new("admin", SecretString::from("hunter2".to_string()));
    let client = MediaClient::new(
        &root,
        &ServicePaths::default(),
        Some(creds),
        &TransportConfig::default(),
    )
    .unwrap();
    (server, client)
}

fn envelope(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope" xmlns:tt="http://www.onvif.org/ver10/schema" xmlns:trt="http://www.onvif.org/ver10/media/wsdl">
<env:Body>{body}</env:Body></env:Envelope>"#
    )
}

fn soap_ok(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/soap+xml; charset=utf-8")
        .set_body_string(envelope(body))
}

const MEDIA_PATH: &str = "/onvif/media_service";

// ── Profiles ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_profiles() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(MEDIA_PATH))
        .and(header_regex("content-type", "application/soap\\+xml"))
        .and(body_string_contains("<GetProfiles"))
        .and(body_string_contains("<wsse:Username>admin</wsse:Username>"))
        .respond_with(soap_ok(
            r#"<trt:GetProfilesResponse>
                <trt:Profiles token="Profile_1" fixed="true">
                  <tt:Name>mainStream</tt:Name>
                  <tt:VideoEncoderConfiguration token="VideoEncoder_1"><tt:Name>enc</tt:Name></tt:VideoEncoderConfiguration>
                </trt:Profiles>
                <trt:Profiles token="Profile_2"><tt:Name>subStream</tt:Name></trt:Profiles>
              </trt:GetProfilesResponse>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let profiles = client.get_profiles().await.unwrap();
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles[0].token, "Profile_1");
    assert_eq!(profiles[0].name.as_deref(), Some("mainStream"));
    assert_eq!(
        profiles[0].video_encoder_token.as_deref(),
        Some("VideoEncoder_1")
    );
    assert_eq!(profiles[1].video_encoder_token, None);
}

#[tokio::test]
async fn test_password_never_sent_in_clear() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(MEDIA_PATH))
        .and(body_string_contains("hunter2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(MEDIA_PATH))
        .respond_with(soap_ok("<trt:GetProfilesResponse/>"))
        .mount(&server)
        .await;

    let profiles = client.get_profiles().await.unwrap();
    assert!(profiles.is_empty());
}

// ── Encoder configuration ───────────────────────────────────────────

#[tokio::test]
async fn test_get_video_encoder_configuration() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(MEDIA_PATH))
        .and(body_string_contains("<GetVideoEncoderConfiguration "))
        .and(body_string_contains(
            "<ConfigurationToken>VideoEncoder_1</ConfigurationToken>",
        ))
        .respond_with(soap_ok(
            r#"<trt:GetVideoEncoderConfigurationResponse>
                <trt:Configuration token="VideoEncoder_1">
                  <tt:Name>VideoEncoder_1</tt:Name><tt:UseCount>2</tt:UseCount>
                  <tt:Encoding>H264</tt:Encoding>
                  <tt:Resolution><tt:Width>1280</tt:Width><tt:Height>720</tt:Height></tt:Resolution>
                  <tt:Quality>4.000000</tt:Quality>
                  <tt:RateControl><tt:FrameRateLimit>25</tt:FrameRateLimit><tt:EncodingInterval>1</tt:EncodingInterval><tt:BitrateLimit>2048</tt:BitrateLimit></tt:RateControl>
                  <tt:H264><tt:GovLength>50</tt:GovLength><tt:H264Profile>Main</tt:H264Profile></tt:H264>
                  <tt:Multicast><tt:Address><tt:Type>IPv4</tt:Type><tt:IPv4Address>239.0.0.1</tt:IPv4Address></tt:Address><tt:Port>5000</tt:Port><tt:TTL>5</tt:TTL><tt:AutoStart>false</tt:AutoStart></tt:Multicast>
                  <tt:SessionTimeout>PT60S</tt:SessionTimeout>
                </trt:Configuration>
              </trt:GetVideoEncoderConfigurationResponse>"#,
        ))
        .mount(&server)
        .await;

    let cfg = client
        .get_video_encoder_configuration("VideoEncoder_1")
        .await
        .unwrap();
    assert_eq!(cfg.token, "VideoEncoder_1");
    assert_eq!(cfg.encoding, "H264");
    assert_eq!((cfg.resolution.width, cfg.resolution.height), (1280, 720));
    assert!((cfg.quality - 4.0).abs() < f64::EPSILON);
    assert!((cfg.frame_rate_limit() - 25.0).abs() < f64::EPSILON);
    assert_eq!(cfg.bitrate_limit(), 2048);
    assert_eq!(cfg.gov_length, Some(50));
    assert_eq!(cfg.multicast.as_ref().map(|m| m.port), Some(5000));
}

#[tokio::test]
async fn test_get_encoder_options() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(MEDIA_PATH))
        .and(body_string_contains("<GetVideoEncoderConfigurationOptions"))
        .and(body_string_contains("<ProfileToken>Profile_1</ProfileToken>"))
        .respond_with(soap_ok(
            r"<trt:GetVideoEncoderConfigurationOptionsResponse><trt:Options>
                <tt:QualityRange><tt:Min>0</tt:Min><tt:Max>10</tt:Max></tt:QualityRange>
                <tt:H264>
                  <tt:ResolutionsAvailable><tt:Width>1280</tt:Width><tt:Height>720</tt:Height></tt:ResolutionsAvailable>
                  <tt:ResolutionsAvailable><tt:Width>1920</tt:Width><tt:Height>1080</tt:Height></tt:ResolutionsAvailable>
                  <tt:GovLengthRange><tt:Min>1</tt:Min><tt:Max>150</tt:Max></tt:GovLengthRange>
                  <tt:FrameRateRange><tt:Min>1</tt:Min><tt:Max>30</tt:Max></tt:FrameRateRange>
                  <tt:EncodingIntervalRange><tt:Min>1</tt:Min><tt:Max>1</tt:Max></tt:EncodingIntervalRange>
                  <tt:H264ProfilesSupported>Main</tt:H264ProfilesSupported>
                </tt:H264>
                <tt:Extension><tt:H264><tt:BitrateRange><tt:Min>512</tt:Min><tt:Max>8192</tt:Max></tt:BitrateRange></tt:H264></tt:Extension>
              </trt:Options></trt:GetVideoEncoderConfigurationOptionsResponse>",
        ))
        .mount(&server)
        .await;

    let options = client
        .get_video_encoder_configuration_options("VideoEncoder_1", "Profile_1")
        .await
        .unwrap();
    assert_eq!(options.len(), 1);
    let h264 = &options[0];
    assert_eq!(h264.encoding, "H264");
    assert_eq!(h264.resolutions.len(), 2);
    assert_eq!(h264.resolutions[1].width, 1920);
    assert_eq!(h264.frame_rate_range.map(|r| r.max), Some(30));
    assert_eq!(h264.bitrate_range.map(|r| (r.min, r.max)), Some((512, 8192)));
}

#[tokio::test]
async fn test_set_video_encoder_configuration() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(MEDIA_PATH))
        .and(body_string_contains("<SetVideoEncoderConfiguration"))
        .and(body_string_contains("<tt:Width>1920</tt:Width>"))
        .and(body_string_contains("<tt:BitrateLimit>8192</tt:BitrateLimit>"))
        .and(body_string_contains(
            "<ForcePersistence>true</ForcePersistence>",
        ))
        .respond_with(soap_ok("<trt:SetVideoEncoderConfigurationResponse/>"))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = camfleet_api::VideoEncoderConfiguration {
        token: "VideoEncoder_1".into(),
        name: "VideoEncoder_1".into(),
        encoding: "H264".into(),
        resolution: camfleet_api::VideoResolution {
            width: 1920,
            height: 1080,
        },
        rate_control: Some(camfleet_api::RateControl {
            frame_rate_limit: 30.0,
            encoding_interval: Some(1),
            bitrate_limit: 8192,
            constant_bit_rate: None,
        }),
        ..Default::default()
    };
    client.set_video_encoder_configuration(&cfg).await.unwrap();
}

#[tokio::test]
async fn test_set_rejected_with_fault() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(MEDIA_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string(envelope(
            r#"<env:Fault><env:Code><env:Value>env:Sender</env:Value><env:Subcode><env:Value>ter:InvalidArgVal</env:Value><env:Subcode><env:Value>ter:ConfigModify</env:Value></env:Subcode></env:Subcode></env:Code><env:Reason><env:Text xml:lang="en">Parameters can not be set</env:Text></env:Reason></env:Fault>"#,
        )))
        .mount(&server)
        .await;

    let result = client
        .set_video_encoder_configuration(&camfleet_api::VideoEncoderConfiguration::default())
        .await;
    match result {
        Err(Error::SoapFault { code, reason }) => {
            assert!(code.starts_with("env:Sender/ter:InvalidArgVal"), "{code}");
            assert_eq!(reason, "Parameters can not be set");
        }
        other => panic!("expected SoapFault, got: {other:?}"),
    }
}

// ── Stream URI ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_stream_uri_decodes_entities() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(MEDIA_PATH))
        .and(body_string_contains("<GetStreamUri"))
        .and(body_string_contains("RTP-Unicast"))
        .respond_with(soap_ok(
            r"<trt:GetStreamUriResponse><trt:MediaUri>
                <tt:Uri>rtsp://10.0.0.5:554/Streaming/Channels/101?transportmode=unicast&amp;profile=Profile_1</tt:Uri>
                <tt:InvalidAfterConnect>false</tt:InvalidAfterConnect>
              </trt:MediaUri></trt:GetStreamUriResponse>",
        ))
        .mount(&server)
        .await;

    let uri = client.get_stream_uri("Profile_1").await.unwrap();
    assert_eq!(
        uri,
        "rtsp://10.0.0.5:554/Streaming/Channels/101?transportmode=unicast&profile=Profile_1"
    );
}

// ── Errors ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(MEDIA_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.get_profiles().await;
    assert!(
        matches!(result, Err(Error::NotAuthorized { .. })),
        "expected NotAuthorized, got: {result:?}"
    );
}

#[tokio::test]
async fn test_missing_response_element() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(MEDIA_PATH))
        .respond_with(soap_ok("<trt:SomethingElse/>"))
        .mount(&server)
        .await;

    let result = client.get_profiles().await;
    assert!(
        matches!(result, Err(Error::Deserialization { .. })),
        "expected Deserialization, got: {result:?}"
    );
}

#[tokio::test]
async fn test_connection_refused_is_connect_error() {
    // Bind and drop a listener so the port is almost certainly closed.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let root = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();
    let client = MediaClient::new(
        &root,
        &ServicePaths::default(),
        None,
        &TransportConfig::default(),
    )
    .unwrap();

    let err = client.get_profiles().await.unwrap_err();
    assert!(err.is_connect(), "expected connect error, got: {err:?}");
    assert!(err.is_transient());
}
