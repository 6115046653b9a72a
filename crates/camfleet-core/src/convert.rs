// ── Wire → domain conversions ──
//
// The only place that looks at raw ONVIF encoder types. Encoding strings
// are normalized here and never travel further inward.

use camfleet_api::{EncoderOptions, Range, RateControl, VideoEncoderConfiguration, VideoResolution};

use crate::model::{EncoderCapabilities, EncoderConfig, Encoding, Resolution, ValueRange};

pub(crate) fn resolution(r: VideoResolution) -> Resolution {
    Resolution::new(r.width, r.height)
}

fn range(r: Range) -> Option<ValueRange> {
    let r = ValueRange {
        min: r.min,
        max: r.max,
    };
    r.is_usable().then_some(r)
}

/// Pick the options section to reason about: the preferred encoding if
/// advertised, else H.264, else whatever comes first.
pub(crate) fn capabilities(
    options: &[EncoderOptions],
    prefer: Option<Encoding>,
) -> EncoderCapabilities {
    let by_encoding = |want: Encoding| {
        options
            .iter()
            .find(|o| Encoding::normalize(&o.encoding) == Some(want))
    };
    let section = prefer
        .and_then(by_encoding)
        .or_else(|| by_encoding(Encoding::H264))
        .or_else(|| options.first());

    let Some(section) = section else {
        return EncoderCapabilities::default();
    };

    EncoderCapabilities {
        encoding: Encoding::normalize(&section.encoding),
        resolutions: section.resolutions.iter().copied().map(resolution).collect(),
        frame_rate_range: section.frame_rate_range.and_then(range),
        bitrate_range: section.bitrate_range.and_then(range),
        quality_range: section.quality_range.and_then(range),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
fn round_u32(v: f64) -> u32 {
    if v.is_finite() && v > 0.0 {
        v.round().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

pub(crate) fn encoder_config(wire: &VideoEncoderConfiguration) -> EncoderConfig {
    EncoderConfig {
        resolution: resolution(wire.resolution),
        quality: round_u32(wire.quality),
        frame_rate: round_u32(wire.frame_rate_limit()),
        bitrate_kbps: wire.bitrate_limit(),
        encoding: Encoding::normalize(&wire.encoding),
    }
}

/// Overlay the set fields of `cfg` onto a configuration read from the
/// device, leaving everything else as the device reported it.
pub(crate) fn apply_to_wire(wire: &mut VideoEncoderConfiguration, cfg: &EncoderConfig) {
    if !cfg.resolution.is_zero() {
        wire.resolution = VideoResolution {
            width: cfg.resolution.width,
            height: cfg.resolution.height,
        };
    }
    if cfg.quality > 0 {
        wire.quality = f64::from(cfg.quality);
    }
    if cfg.frame_rate > 0 || cfg.bitrate_kbps > 0 {
        let rc = wire.rate_control.get_or_insert_with(|| RateControl {
            encoding_interval: Some(1),
            ..RateControl::default()
        });
        if cfg.frame_rate > 0 {
            rc.frame_rate_limit = f64::from(cfg.frame_rate);
        }
        if cfg.bitrate_kbps > 0 {
            rc.bitrate_limit = cfg.bitrate_kbps;
        }
    }
    if let Some(encoding) = cfg.encoding {
        if Encoding::normalize(&wire.encoding) != Some(encoding) {
            wire.encoding = encoding.onvif_name().to_owned();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(encoding: &str, widths: &[u32]) -> EncoderOptions {
        EncoderOptions {
            encoding: encoding.into(),
            resolutions: widths
                .iter()
                .map(|&w| VideoResolution {
                    width: w,
                    height: w * 9 / 16,
                })
                .collect(),
            frame_rate_range: Some(Range { min: 1, max: 30 }),
            bitrate_range: Some(Range { min: 0, max: 0 }),
            quality_range: None,
        }
    }

    #[test]
    fn prefers_h264_section() {
        let opts = [options("JPEG", &[640]), options("H264", &[1280, 1920])];
        let caps = capabilities(&opts, None);
        assert_eq!(caps.encoding, Some(Encoding::H264));
        assert_eq!(caps.resolutions.len(), 2);
        assert_eq!(caps.frame_rate_range, Some(ValueRange { min: 1, max: 30 }));
        // A 0..0 range is "not advertised".
        assert_eq!(caps.bitrate_range, None);

        let caps = capabilities(&opts, Some(Encoding::Mjpeg));
        assert_eq!(caps.encoding, Some(Encoding::Mjpeg));
        assert!(capabilities(&[], None).resolutions.is_empty());
    }

    #[test]
    fn wire_config_normalizes_encoding_and_rounds() {
        let wire = VideoEncoderConfiguration {
            encoding: "h264".into(),
            resolution: VideoResolution {
                width: 1280,
                height: 720,
            },
            quality: 4.6,
            rate_control: Some(RateControl {
                frame_rate_limit: 24.9,
                encoding_interval: Some(1),
                bitrate_limit: 2048,
                constant_bit_rate: None,
            }),
            ..VideoEncoderConfiguration::default()
        };
        let cfg = encoder_config(&wire);
        assert_eq!(cfg.resolution, Resolution::new(1280, 720));
        assert_eq!(cfg.quality, 5);
        assert_eq!(cfg.frame_rate, 25);
        assert_eq!(cfg.bitrate_kbps, 2048);
        assert_eq!(cfg.encoding, Some(Encoding::H264));
    }

    #[test]
    fn overlay_keeps_unset_fields() {
        let mut wire = VideoEncoderConfiguration {
            encoding: "H264".into(),
            gov_length: Some(50),
            quality: 3.0,
            ..VideoEncoderConfiguration::default()
        };
        let cfg = EncoderConfig::new(1920, 1080).with_frame_rate(30);
        apply_to_wire(&mut wire, &cfg);
        assert_eq!(wire.resolution.width, 1920);
        assert!((wire.frame_rate_limit() - 30.0).abs() < f64::EPSILON);
        assert_eq!(wire.bitrate_limit(), 0);
        assert!((wire.quality - 3.0).abs() < f64::EPSILON);
        assert_eq!(wire.gov_length, Some(50));
        assert_eq!(wire.encoding, "H264");

        apply_to_wire(&mut wire, &EncoderConfig::new(0, 0).with_encoding(Encoding::Mjpeg));
        assert_eq!(wire.encoding, "JPEG");
        assert_eq!(wire.resolution.width, 1920);
    }
}
