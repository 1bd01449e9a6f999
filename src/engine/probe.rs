// Input probing using ffprobe

use crate::engine::core::parse_duration_output;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Codec names ffprobe reports for HEVC video
const HEVC_CODEC_NAMES: &[&str] = &["hevc", "h265"];

/// Media metadata queries. Every failure degrades to `None`.
pub trait MediaProbe {
    /// Container duration in seconds
    fn duration(&self, path: &Path) -> Option<f64>;

    /// Codec name of the first video stream
    fn video_codec(&self, path: &Path) -> Option<String>;
}

/// Whether a codec name denotes HEVC
pub fn is_target_codec(codec: &str) -> bool {
    HEVC_CODEC_NAMES
        .iter()
        .any(|c| c.eq_ignore_ascii_case(codec.trim()))
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStreams {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

/// Parse `-show_entries stream=codec_name -of json` output
pub fn parse_codec_json(json: &str) -> Option<String> {
    let probe: FfprobeStreams = serde_json::from_str(json).ok()?;
    probe
        .streams
        .into_iter()
        .find_map(|s| s.codec_name)
        .filter(|c| !c.is_empty())
}

/// `MediaProbe` backed by the ffprobe binary
#[derive(Debug, Clone)]
pub struct Ffprobe {
    program: PathBuf,
}

impl Ffprobe {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&str], path: &Path) -> Option<String> {
        let output = Command::new(&self.program)
            .args(args)
            .arg(path)
            .stdin(Stdio::null())
            .output();

        match output {
            Ok(out) if out.status.success() => Some(String::from_utf8_lossy(&out.stdout).to_string()),
            Ok(out) => {
                tracing::debug!(
                    file = %path.display(),
                    status = %out.status,
                    stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                    "ffprobe failed"
                );
                None
            }
            Err(e) => {
                tracing::debug!(file = %path.display(), error = %e, "could not run ffprobe");
                None
            }
        }
    }
}

impl MediaProbe for Ffprobe {
    fn duration(&self, path: &Path) -> Option<f64> {
        let stdout = self.run(
            &[
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=nw=1:nk=1",
            ],
            path,
        )?;
        parse_duration_output(&stdout)
    }

    fn video_codec(&self, path: &Path) -> Option<String> {
        let stdout = self.run(
            &[
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=codec_name",
                "-of",
                "json",
            ],
            path,
        )?;
        parse_codec_json(&stdout)
    }
}
