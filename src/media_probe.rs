//! Advisory media metadata extraction, used only to pre-filter duplicate
//! candidates before committing to a hash — never to assert duplication.

use crate::types::MediaFacts;
use serde::Deserialize;
use std::io::{Error, ErrorKind, Result as IoResult};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

pub trait MediaProbe: Send + Sync {
    fn probe(&self, path: &Path) -> Option<MediaFacts>;
}

/// Tolerance, in seconds, for treating two durations as equal during pre-filtering.
pub const DURATION_TOLERANCE_SECONDS: f64 = 1.0;

pub fn durations_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= DURATION_TOLERANCE_SECONDS
}

/// Always reports unknown facts. Used when `use_media_probe` is off and as
/// the fallback when `ffprobe` is not installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMediaProbe;

impl MediaProbe for NullMediaProbe {
    fn probe(&self, _path: &Path) -> Option<MediaFacts> {
        None
    }
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeStream {
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    codec_name: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

/// Upper bound on a single probe invocation. `ffprobe` on a well-formed file
/// returns in milliseconds; this only guards against a hung or wedged process.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Runs `command`, polling for completion rather than blocking on `wait()`
/// so a hung child can be killed and reaped instead of leaking it.
fn run_with_timeout(mut command: Command, timeout: Duration) -> IoResult<Output> {
    let mut child = command.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn()?;
    let started = Instant::now();

    loop {
        if child.try_wait()?.is_some() {
            return child.wait_with_output();
        }
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::new(ErrorKind::TimedOut, "ffprobe did not exit within the probe timeout"));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn ffprobe_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| {
        Command::new("ffprobe")
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    })
}

/// Shells out to `ffprobe`. Any failure degrades to `None` — probing is
/// advisory and must never abort a scan.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfprobeMediaProbe {
    pub probe_codec: bool,
    pub probe_resolution: bool,
}

impl MediaProbe for FfprobeMediaProbe {
    fn probe(&self, path: &Path) -> Option<MediaFacts> {
        if !ffprobe_available() {
            return None;
        }

        let mut command = Command::new("ffprobe");
        command
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path);

        let output = match run_with_timeout(command, PROBE_TIMEOUT) {
            Ok(o) if o.status.success() => o,
            Ok(o) => {
                tracing::debug!(path = %path.display(), status = ?o.status, "ffprobe exited non-zero");
                return None;
            }
            Err(error) if error.kind() == ErrorKind::TimedOut => {
                tracing::debug!(path = %path.display(), "ffprobe timed out, killed and reaped");
                return None;
            }
            Err(error) => {
                tracing::debug!(path = %path.display(), %error, "failed to spawn ffprobe");
                return None;
            }
        };

        let parsed: FfprobeOutput = match serde_json::from_slice(&output.stdout) {
            Ok(p) => p,
            Err(error) => {
                tracing::debug!(path = %path.display(), %error, "failed to parse ffprobe output");
                return None;
            }
        };

        let duration_seconds = parsed
            .format
            .as_ref()
            .and_then(|f| f.duration.as_ref())
            .and_then(|d| d.parse::<f64>().ok());

        let video_stream = parsed.streams.iter().find(|s| s.codec_type.as_deref() == Some("video"));

        let codec = if self.probe_codec {
            video_stream.and_then(|s| s.codec_name.clone())
        } else {
            None
        };

        let resolution = if self.probe_resolution {
            video_stream.and_then(|s| match (s.width, s.height) {
                (Some(w), Some(h)) => Some(format!("{w}x{h}")),
                _ => None,
            })
        } else {
            None
        };

        if duration_seconds.is_none() && codec.is_none() && resolution.is_none() {
            return None;
        }

        Some(MediaFacts { duration_seconds, codec, resolution })
    }
}
