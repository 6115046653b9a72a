// camfleet-api: Async Rust client for the ONVIF Media encoder services
//
// Two protocol generations are exposed side by side: `MediaClient`
// (Media ver10, the primary path) and `Media2Client` (Media2 ver20, the
// fallback path). Both speak SOAP 1.2 over HTTP with WS-Security
// UsernameToken digests and return raw wire models; normalization into
// domain types happens in `camfleet-core`.

pub mod auth;
pub mod error;
pub mod media;
pub mod soap;
pub mod transport;
pub mod xml;

pub use auth::Credentials;
pub use error::Error;
pub use media::models::{
    EncoderOptions, Multicast, Profile, RateControl, Range, VideoEncoderConfiguration,
    VideoResolution,
};
pub use media::{Media2Client, MediaClient, ServicePaths};
pub use soap::SoapClient;
pub use transport::TransportConfig;
