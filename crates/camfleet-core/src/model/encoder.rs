// ── Encoder configuration types ──

use std::fmt;

use serde::{Deserialize, Serialize};

/// Frame size in pixels. `Resolution::ZERO` is the "no match" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const ZERO: Self = Self {
        width: 0,
        height: 0,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Width over height; 0.0 for a degenerate resolution.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            f64::from(self.width) / f64::from(self.height)
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Video codec, normalized from whatever the device or probe reported.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(ascii_case_insensitive)]
pub enum Encoding {
    #[strum(to_string = "H264", serialize = "avc", serialize = "h.264")]
    H264,
    #[strum(to_string = "H265", serialize = "hevc", serialize = "h.265")]
    H265,
    #[strum(to_string = "MJPEG", serialize = "jpeg", serialize = "mjpg")]
    Mjpeg,
    #[strum(to_string = "MPEG4", serialize = "mp4v", serialize = "mpeg-4")]
    Mpeg4,
}

impl Encoding {
    /// Lenient parse: names in any case, common aliases, and the numeric
    /// ONVIF enumeration values (0 = JPEG, 1 = MPEG4, 2 = H264).
    pub fn normalize(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(code) = raw.parse::<u32>() {
            return match code {
                0 => Some(Self::Mjpeg),
                1 => Some(Self::Mpeg4),
                2 => Some(Self::H264),
                3 => Some(Self::H265),
                _ => None,
            };
        }
        raw.parse().ok()
    }

    /// Name the Media services expect when writing a configuration.
    pub fn onvif_name(self) -> &'static str {
        match self {
            Self::H264 => "H264",
            Self::H265 => "H265",
            Self::Mjpeg => "JPEG",
            Self::Mpeg4 => "MPEG4",
        }
    }
}

/// Encoder settings. Zero means "unset" for every numeric field.
///
/// The same shape plays four roles (desired, current, applied, observed);
/// [`TaggedConfig`] carries the role wherever it is not implied by a field
/// name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EncoderConfig {
    pub resolution: Resolution,
    #[serde(default)]
    pub quality: u32,
    #[serde(default)]
    pub frame_rate: u32,
    #[serde(default)]
    pub bitrate_kbps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<Encoding>,
}

impl EncoderConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            resolution: Resolution::new(width, height),
            ..Self::default()
        }
    }

    pub fn with_frame_rate(mut self, fps: u32) -> Self {
        self.frame_rate = fps;
        self
    }

    pub fn with_bitrate(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = kbps;
        self
    }

    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }
}

impl fmt::Display for EncoderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resolution)?;
        if self.frame_rate > 0 {
            write!(f, " @ {}fps", self.frame_rate)?;
        }
        if self.bitrate_kbps > 0 {
            write!(f, ", {} kbps", self.bitrate_kbps)?;
        }
        if let Some(enc) = self.encoding {
            write!(f, ", {enc}")?;
        }
        Ok(())
    }
}

/// Which role an [`EncoderConfig`] instance plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConfigRole {
    /// Caller input.
    Desired,
    /// Read from the device before any write.
    Current,
    /// What was written (or would have been, if unchanged).
    Applied,
    /// Measured from the live stream.
    Observed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaggedConfig {
    pub role: ConfigRole,
    pub config: EncoderConfig,
}

impl TaggedConfig {
    pub fn new(role: ConfigRole, config: EncoderConfig) -> Self {
        Self { role, config }
    }
}

impl fmt::Display for TaggedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role, self.config)
    }
}

/// Inclusive range advertised by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: u32,
    pub max: u32,
}

impl ValueRange {
    /// Ranges with `min > max` or `max == 0` are treated as absent.
    pub fn is_usable(&self) -> bool {
        self.max > 0 && self.min <= self.max
    }

    pub fn contains(&self, value: u32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    pub fn clamp(&self, value: u32) -> u32 {
        if self.is_usable() {
            value.clamp(self.min, self.max)
        } else {
            value
        }
    }
}

/// What a device will accept for one (profile, configuration) pair.
/// Re-fetched on every apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EncoderCapabilities {
    pub encoding: Option<Encoding>,
    pub resolutions: Vec<Resolution>,
    pub frame_rate_range: Option<ValueRange>,
    pub bitrate_range: Option<ValueRange>,
    pub quality_range: Option<ValueRange>,
}
