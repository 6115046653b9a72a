// Wire models shared by the Media (ver10) and Media2 (ver20) services.
//
// These mirror the ONVIF schema closely and keep the encoding as the raw
// string the device sent. Parsing and serialization for each generation
// lives here so the two clients stay thin.

use std::fmt::Write as _;

use serde::Serialize;

use crate::xml::{self, Element};

/// A media profile and the encoder configuration bound to it, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub token: String,
    pub name: Option<String>,
    pub video_encoder_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct VideoResolution {
    pub width: u32,
    pub height: u32,
}

/// Inclusive numeric range as advertised by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Range {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RateControl {
    pub frame_rate_limit: f64,
    pub encoding_interval: Option<u32>,
    pub bitrate_limit: u32,
    pub constant_bit_rate: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Multicast {
    pub address_type: String,
    pub address: String,
    pub port: u32,
    pub ttl: u32,
    pub auto_start: bool,
}

impl Default for Multicast {
    fn default() -> Self {
        Self {
            address_type: "IPv4".into(),
            address: "0.0.0.0".into(),
            port: 0,
            ttl: 0,
            auto_start: false,
        }
    }
}

/// A video encoder configuration exactly as the device reports it.
///
/// Writes send the whole structure back, so fields the engine does not
/// reason about (multicast, session timeout, GOP) are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct VideoEncoderConfiguration {
    pub token: String,
    pub name: String,
    pub use_count: u32,
    /// Raw encoding name (`H264`, `JPEG`, `H265`, ...).
    pub encoding: String,
    pub resolution: VideoResolution,
    pub quality: f64,
    pub rate_control: Option<RateControl>,
    pub gov_length: Option<u32>,
    /// H.264/H.265 profile (`Main`, `High`, ...).
    pub profile: Option<String>,
    pub multicast: Option<Multicast>,
    pub session_timeout: Option<String>,
}

/// Encoder options for one encoding.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EncoderOptions {
    pub encoding: String,
    pub resolutions: Vec<VideoResolution>,
    pub frame_rate_range: Option<Range>,
    pub bitrate_range: Option<Range>,
    pub quality_range: Option<Range>,
}

// ── Parsing helpers ─────────────────────────────────────────────────

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
fn to_u32(v: f64) -> u32 {
    if v.is_finite() && v > 0.0 {
        v.round().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

fn child_u32(el: &Element<'_>, tag: &str) -> Option<u32> {
    el.child_number(tag).map(to_u32)
}

fn parse_resolution(el: &Element<'_>) -> VideoResolution {
    VideoResolution {
        width: child_u32(el, "Width").unwrap_or(0),
        height: child_u32(el, "Height").unwrap_or(0),
    }
}

fn parse_range(el: Option<Element<'_>>) -> Option<Range> {
    let el = el?;
    Some(Range {
        min: child_u32(&el, "Min")?,
        max: child_u32(&el, "Max")?,
    })
}

fn parse_multicast(el: &Element<'_>) -> Multicast {
    let address = el.child("Address");
    let address_type = address
        .and_then(|a| a.child_text("Type"))
        .map_or_else(|| "IPv4".to_owned(), std::borrow::Cow::into_owned);
    let addr = address
        .and_then(|a| {
            a.child_text("IPv4Address")
                .or_else(|| a.child_text("IPv6Address"))
        })
        .map_or_else(|| "0.0.0.0".to_owned(), std::borrow::Cow::into_owned);
    Multicast {
        address_type,
        address: addr,
        port: child_u32(el, "Port").unwrap_or(0),
        ttl: child_u32(el, "TTL").unwrap_or(0),
        auto_start: el
            .child_text("AutoStart")
            .is_some_and(|v| v.eq_ignore_ascii_case("true")),
    }
}

impl Profile {
    pub(crate) fn from_ver10(el: &Element<'_>) -> Option<Self> {
        Some(Self {
            token: el.attr("token")?.into_owned(),
            name: el.child_text("Name").map(std::borrow::Cow::into_owned),
            video_encoder_token: el
                .child("VideoEncoderConfiguration")
                .and_then(|enc| enc.attr("token"))
                .map(std::borrow::Cow::into_owned)
                .filter(|t| !t.is_empty()),
        })
    }

    pub(crate) fn from_ver20(el: &Element<'_>) -> Option<Self> {
        Some(Self {
            token: el.attr("token")?.into_owned(),
            name: el.child_text("Name").map(std::borrow::Cow::into_owned),
            video_encoder_token: el
                .child("Configurations")
                .and_then(|c| c.child("VideoEncoder"))
                .and_then(|enc| enc.attr("token"))
                .map(std::borrow::Cow::into_owned)
                .filter(|t| !t.is_empty()),
        })
    }
}

impl VideoEncoderConfiguration {
    pub(crate) fn from_ver10(el: &Element<'_>) -> Self {
        let rate_control = el.child("RateControl").map(|rc| RateControl {
            frame_rate_limit: rc.child_number("FrameRateLimit").unwrap_or(0.0),
            encoding_interval: child_u32(&rc, "EncodingInterval"),
            bitrate_limit: child_u32(&rc, "BitrateLimit").unwrap_or(0),
            constant_bit_rate: None,
        });
        let codec = el.child("H264").or_else(|| el.child("MPEG4"));
        Self {
            token: el.attr("token").unwrap_or_default().into_owned(),
            name: el.child_text("Name").unwrap_or_default().into_owned(),
            use_count: child_u32(el, "UseCount").unwrap_or(0),
            encoding: el.child_text("Encoding").unwrap_or_default().into_owned(),
            resolution: el
                .child("Resolution")
                .map(|r| parse_resolution(&r))
                .unwrap_or_default(),
            quality: el.child_number("Quality").unwrap_or(0.0),
            rate_control,
            gov_length: codec.and_then(|c| child_u32(&c, "GovLength")),
            profile: codec
                .and_then(|c| {
                    c.child_text("H264Profile")
                        .or_else(|| c.child_text("Mpeg4Profile"))
                })
                .map(std::borrow::Cow::into_owned),
            multicast: el.child("Multicast").map(|m| parse_multicast(&m)),
            session_timeout: el
                .child_text("SessionTimeout")
                .map(std::borrow::Cow::into_owned),
        }
    }

    pub(crate) fn from_ver20(el: &Element<'_>) -> Self {
        let rate_control = el.child("RateControl").map(|rc| RateControl {
            frame_rate_limit: rc.child_number("FrameRateLimit").unwrap_or(0.0),
            encoding_interval: None,
            bitrate_limit: child_u32(&rc, "BitrateLimit").unwrap_or(0),
            constant_bit_rate: rc
                .attr("ConstantBitRate")
                .map(|v| v.eq_ignore_ascii_case("true")),
        });
        Self {
            token: el.attr("token").unwrap_or_default().into_owned(),
            name: el.child_text("Name").unwrap_or_default().into_owned(),
            use_count: child_u32(el, "UseCount").unwrap_or(0),
            encoding: el.child_text("Encoding").unwrap_or_default().into_owned(),
            resolution: el
                .child("Resolution")
                .map(|r| parse_resolution(&r))
                .unwrap_or_default(),
            quality: el.child_number("Quality").unwrap_or(0.0),
            rate_control,
            gov_length: el
                .attr("GovLength")
                .and_then(|v| v.trim().parse().ok()),
            profile: el.attr("Profile").map(std::borrow::Cow::into_owned),
            multicast: el.child("Multicast").map(|m| parse_multicast(&m)),
            session_timeout: None,
        }
    }

    fn write_multicast(&self, out: &mut String) {
        let m = self.multicast.clone().unwrap_or_default();
        let addr_tag = if m.address_type.eq_ignore_ascii_case("IPv6") {
            "IPv6Address"
        } else {
            "IPv4Address"
        };
        let _ = write!(
            out,
            "<tt:Multicast><tt:Address><tt:Type>{}</tt:Type><tt:{addr_tag}>{}</tt:{addr_tag}></tt:Address><tt:Port>{}</tt:Port><tt:TTL>{}</tt:TTL><tt:AutoStart>{}</tt:AutoStart></tt:Multicast>",
            xml::escape(&m.address_type),
            xml::escape(&m.address),
            m.port,
            m.ttl,
            m.auto_start,
        );
    }

    /// `<Configuration>` element for a Media ver10 `SetVideoEncoderConfiguration`.
    pub(crate) fn to_ver10_xml(&self) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            r#"<Configuration token="{}"><tt:Name>{}</tt:Name><tt:UseCount>{}</tt:UseCount><tt:Encoding>{}</tt:Encoding><tt:Resolution><tt:Width>{}</tt:Width><tt:Height>{}</tt:Height></tt:Resolution><tt:Quality>{}</tt:Quality>"#,
            xml::escape(&self.token),
            xml::escape(&self.name),
            self.use_count,
            xml::escape(&self.encoding),
            self.resolution.width,
            self.resolution.height,
            self.quality,
        );
        if let Some(rc) = &self.rate_control {
            let _ = write!(
                out,
                "<tt:RateControl><tt:FrameRateLimit>{}</tt:FrameRateLimit><tt:EncodingInterval>{}</tt:EncodingInterval><tt:BitrateLimit>{}</tt:BitrateLimit></tt:RateControl>",
                to_u32(rc.frame_rate_limit),
                rc.encoding_interval.unwrap_or(1),
                rc.bitrate_limit,
            );
        }
        let codec_tag = match self.encoding.to_ascii_uppercase().as_str() {
            "H264" => Some(("H264", "H264Profile")),
            "MPEG4" => Some(("MPEG4", "Mpeg4Profile")),
            _ => None,
        };
        if let (Some((tag, profile_tag)), Some(gov)) = (codec_tag, self.gov_length) {
            let profile = self.profile.as_deref().unwrap_or("Main");
            let _ = write!(
                out,
                "<tt:{tag}><tt:GovLength>{gov}</tt:GovLength><tt:{profile_tag}>{}</tt:{profile_tag}></tt:{tag}>",
                xml::escape(profile),
            );
        }
        self.write_multicast(&mut out);
        let _ = write!(
            out,
            "<tt:SessionTimeout>{}</tt:SessionTimeout></Configuration>",
            xml::escape(self.session_timeout.as_deref().unwrap_or("PT60S")),
        );
        out
    }

    /// `<Configuration>` element for a Media2 ver20 `SetVideoEncoderConfiguration`.
    pub(crate) fn to_ver20_xml(&self) -> String {
        let mut out = String::new();
        let _ = write!(out, r#"<Configuration token="{}""#, xml::escape(&self.token));
        if let Some(gov) = self.gov_length {
            let _ = write!(out, r#" GovLength="{gov}""#);
        }
        if let Some(profile) = &self.profile {
            let _ = write!(out, r#" Profile="{}""#, xml::escape(profile));
        }
        let _ = write!(
            out,
            "><tt:Name>{}</tt:Name><tt:UseCount>{}</tt:UseCount><tt:Encoding>{}</tt:Encoding><tt:Resolution><tt:Width>{}</tt:Width><tt:Height>{}</tt:Height></tt:Resolution>",
            xml::escape(&self.name),
            self.use_count,
            xml::escape(&self.encoding),
            self.resolution.width,
            self.resolution.height,
        );
        if let Some(rc) = &self.rate_control {
            let cbr = rc
                .constant_bit_rate
                .map(|v| format!(r#" ConstantBitRate="{v}""#))
                .unwrap_or_default();
            let _ = write!(
                out,
                "<tt:RateControl{cbr}><tt:FrameRateLimit>{}</tt:FrameRateLimit><tt:BitrateLimit>{}</tt:BitrateLimit></tt:RateControl>",
                rc.frame_rate_limit, rc.bitrate_limit,
            );
        }
        if self.multicast.is_some() {
            self.write_multicast(&mut out);
        }
        let _ = write!(out, "<tt:Quality>{}</tt:Quality></Configuration>", self.quality);
        out
    }

    pub fn frame_rate_limit(&self) -> f64 {
        self.rate_control.as_ref().map_or(0.0, |rc| rc.frame_rate_limit)
    }

    pub fn bitrate_limit(&self) -> u32 {
        self.rate_control.as_ref().map_or(0, |rc| rc.bitrate_limit)
    }
}

impl EncoderOptions {
    /// Media ver10 `Options`: one section per codec (`JPEG`, `MPEG4`, `H264`),
    /// with bitrate ranges tucked into `Extension`.
    pub(crate) fn from_ver10(options: &Element<'_>) -> Vec<Self> {
        let quality_range = parse_range(options.child("QualityRange"));
        let extension = options.child("Extension");
        let mut out = Vec::new();
        for (tag, encoding) in [("H264", "H264"), ("JPEG", "JPEG"), ("MPEG4", "MPEG4")] {
            // The codec section directly under Options; `Extension` carries a
            // same-named section that must not be mistaken for it.
            let section = xml::find_all(options.inner(), tag)
                .into_iter()
                .find(|s| s.child("ResolutionsAvailable").is_some());
            let Some(section) = section else {
                continue;
            };
            let bitrate_range = extension
                .and_then(|ext| ext.child(tag))
                .and_then(|s| parse_range(s.child("BitrateRange")));
            out.push(Self {
                encoding: encoding.to_owned(),
                resolutions: section
                    .children("ResolutionsAvailable")
                    .iter()
                    .map(parse_resolution)
                    .collect(),
                frame_rate_range: parse_range(section.child("FrameRateRange")),
                bitrate_range,
                quality_range,
            });
        }
        out
    }

    /// Media2 ver20 `Options`: one element per encoding with frame rates as
    /// a space-separated attribute list.
    pub(crate) fn from_ver20(options: &Element<'_>) -> Self {
        let frame_rates: Vec<u32> = options
            .attr("FrameRatesSupported")
            .map(|list| {
                list.split_whitespace()
                    .filter_map(|v| v.parse::<f64>().ok())
                    .map(to_u32)
                    .filter(|v| *v > 0)
                    .collect()
            })
            .unwrap_or_default();
        let frame_rate_range = match (frame_rates.iter().min(), frame_rates.iter().max()) {
            (Some(&min), Some(&max)) => Some(Range { min, max }),
            _ => None,
        };
        Self {
            encoding: options.child_text("Encoding").unwrap_or_default().into_owned(),
            resolutions: options
                .children("ResolutionsAvailable")
                .iter()
                .map(parse_resolution)
                .collect(),
            frame_rate_range,
            bitrate_range: parse_range(options.child("BitrateRange")),
            quality_range: parse_range(options.child("QualityRange")),
        }
    }
}
