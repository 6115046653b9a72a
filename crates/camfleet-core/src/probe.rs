// ── Stream probing ──
//
// `StreamProbe` measures what a live stream actually carries. The default
// implementation shells out to ffprobe over RTSP/TCP and reads its JSON.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::error::CoreError;
use crate::model::{Encoding, StreamInfo, redact_url};

/// Measures resolution, frame rate, bitrate and codec of a stream URL.
#[async_trait]
pub trait StreamProbe: Send + Sync {
    async fn probe(&self, url: &str) -> Result<StreamInfo, CoreError>;
}

/// Runs `ffprobe` as a child process.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: PathBuf,
    timeout: Duration,
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe", Duration::from_secs(15))
    }
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn command(&self, url: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["-v", "error", "-rtsp_transport", "tcp"])
            .args(["-print_format", "json", "-show_streams"])
            .args(["-select_streams", "v:0"])
            .arg(url)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

fn probe_failed(message: impl Into<String>) -> CoreError {
    CoreError::ProbeFailed {
        message: message.into(),
    }
}

#[async_trait]
impl StreamProbe for FfprobeProbe {
    async fn probe(&self, url: &str) -> Result<StreamInfo, CoreError> {
        debug!(url = %redact_url(url), binary = %self.binary.display(), "probing stream");

        let output = tokio::time::timeout(self.timeout, self.command(url).output())
            .await
            .map_err(|_| probe_failed(format!("ffprobe timed out after {:?}", self.timeout)))?
            .map_err(|e| probe_failed(format!("failed to run {}: {e}", self.binary.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(probe_failed(if stderr.is_empty() {
                format!("ffprobe exited with {}", output.status)
            } else {
                format!("ffprobe exited with {}: {stderr}", output.status)
            }));
        }

        parse_ffprobe_output(&output.stdout)
    }
}

// ── ffprobe JSON ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    #[serde(default)]
    codec_name: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    /// Bits per second, as a decimal string.
    bit_rate: Option<String>,
}

/// Parse `ffprobe -print_format json -show_streams` output.
pub fn parse_ffprobe_output(stdout: &[u8]) -> Result<StreamInfo, CoreError> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Err(probe_failed("ffprobe returned no data"));
    }
    let parsed: FfprobeOutput = serde_json::from_slice(stdout)
        .map_err(|e| probe_failed(format!("failed to parse ffprobe output: {e}")))?;
    let stream = parsed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| probe_failed("no video stream found"))?;

    // avg_frame_rate is what the encoder actually delivers; r_frame_rate
    // is the container's base rate and only a fallback.
    let frame_rate = [stream.avg_frame_rate.as_deref(), stream.r_frame_rate.as_deref()]
        .into_iter()
        .flatten()
        .find_map(parse_frame_rate)
        .unwrap_or(0.0);

    let bitrate_kbps = stream
        .bit_rate
        .as_deref()
        .and_then(|b| b.trim().parse::<u64>().ok())
        .map(|bps| u32::try_from(bps / 1000).unwrap_or(u32::MAX));

    Ok(StreamInfo {
        encoding: Encoding::normalize(&stream.codec_name),
        codec: stream.codec_name,
        width: stream.width,
        height: stream.height,
        frame_rate,
        bitrate_kbps,
    })
}

/// Parse `"num/den"` (or a plain number) into frames per second.
/// `"0/0"` and other non-positive rates yield `None`.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let fps = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rate_fractions() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        let ntsc = parse_frame_rate("30000/1001").unwrap_or_default();
        assert!((ntsc - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn parses_first_video_stream() {
        let json = br#"{
            "streams": [{
                "index": 0,
                "codec_name": "h264",
                "codec_type": "video",
                "width": 1920,
                "height": 1080,
                "r_frame_rate": "90000/1",
                "avg_frame_rate": "30/1",
                "bit_rate": "8192000"
            }]
        }"#;
        let info = parse_ffprobe_output(json).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(info.codec, "h264");
        assert_eq!(info.encoding, Some(Encoding::H264));
        assert_eq!((info.width, info.height), (1920, 1080));
        assert!((info.frame_rate - 30.0).abs() < f64::EPSILON);
        assert_eq!(info.bitrate_kbps, Some(8192));
    }

    #[test]
    fn avg_rate_unknown_uses_base_rate() {
        let json = br#"{"streams":[{"codec_name":"hevc","width":1280,"height":720,
            "avg_frame_rate":"0/0","r_frame_rate":"25/1"}]}"#;
        let info = parse_ffprobe_output(json).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(info.encoding, Some(Encoding::H265));
        assert!((info.frame_rate - 25.0).abs() < f64::EPSILON);
        assert_eq!(info.bitrate_kbps, None);
    }

    #[test]
    fn failures() {
        let msg = |r: Result<StreamInfo, CoreError>| r.err().map(|e| e.to_string()).unwrap_or_default();
        assert!(msg(parse_ffprobe_output(b"  \n")).contains("ffprobe returned no data"));
        assert!(msg(parse_ffprobe_output(br#"{"streams":[]}"#)).contains("no video stream found"));
        assert!(msg(parse_ffprobe_output(b"{}")).contains("no video stream found"));
        assert!(msg(parse_ffprobe_output(b"not json")).contains("failed to parse"));
    }

    #[tokio::test]
    async fn missing_binary_is_a_probe_failure() {
        let probe = FfprobeProbe::new("/nonexistent/ffprobe", Duration::from_secs(1));
        let err = probe.probe("rtsp://127.0.0.1/stream").await.err();
        assert!(matches!(err, Some(CoreError::ProbeFailed { .. })));
    }
}
