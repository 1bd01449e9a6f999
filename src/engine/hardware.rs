//! HEVC encoder backends and hardware capability detection

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Preset vocabulary shared by x264/x265 (fastest to slowest)
pub const PRESETS: &[&str] = &[
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
    "placebo",
];

/// Hardware backends in the order they are tried
pub const HARDWARE_PRIORITY: [EncoderBackend; 3] =
    [EncoderBackend::Nvenc, EncoderBackend::Qsv, EncoderBackend::Amf];

// ============================================================================
// Backend table
// ============================================================================

/// Supported HEVC encoder backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncoderBackend {
    Nvenc, // NVIDIA NVENC
    Qsv,   // Intel Quick Sync
    Amf,   // AMD AMF
    X265,  // Software libx265
}

/// Static description of one backend: how it is named, how its presets map,
/// and how quality is expressed on the ffmpeg command line.
pub struct BackendSpec {
    pub id: &'static str,
    pub display_name: &'static str,
    pub ffmpeg_encoder: &'static str,
    pub map_preset: fn(&str) -> String,
    pub encoder_args: fn(u32, &str) -> Vec<String>,
}

static BACKENDS: [BackendSpec; 4] = [
    BackendSpec {
        id: "nvenc",
        display_name: "NVIDIA (NVENC)",
        ffmpeg_encoder: "hevc_nvenc",
        map_preset: map_preset_nvenc,
        encoder_args: nvenc_encoder_args,
    },
    BackendSpec {
        id: "qsv",
        display_name: "Intel (QSV)",
        ffmpeg_encoder: "hevc_qsv",
        map_preset: map_preset_qsv,
        encoder_args: qsv_encoder_args,
    },
    BackendSpec {
        id: "amf",
        display_name: "AMD (AMF)",
        ffmpeg_encoder: "hevc_amf",
        map_preset: map_quality_amf,
        encoder_args: amf_encoder_args,
    },
    BackendSpec {
        id: "x265",
        display_name: "CPU (x265)",
        ffmpeg_encoder: "libx265",
        map_preset: map_preset_x265,
        encoder_args: x265_encoder_args,
    },
];

impl EncoderBackend {
    pub const ALL: [EncoderBackend; 4] = [Self::Nvenc, Self::Qsv, Self::Amf, Self::X265];

    pub fn spec(&self) -> &'static BackendSpec {
        match self {
            Self::Nvenc => &BACKENDS[0],
            Self::Qsv => &BACKENDS[1],
            Self::Amf => &BACKENDS[2],
            Self::X265 => &BACKENDS[3],
        }
    }

    /// Short identifier used in config files and output suffixes
    pub fn id(&self) -> &'static str {
        self.spec().id
    }

    pub fn display_name(&self) -> &'static str {
        self.spec().display_name
    }

    /// Get the FFmpeg encoder name
    pub fn ffmpeg_encoder(&self) -> &'static str {
        self.spec().ffmpeg_encoder
    }

    pub fn is_hardware(&self) -> bool {
        !matches!(self, Self::X265)
    }

    /// Filename suffix marking which backend produced an output
    pub fn suffix(&self) -> String {
        if self.is_hardware() {
            format!("_x265_{}", self.id())
        } else {
            "_x265".to_string()
        }
    }

    /// Translate an x264-style preset into this backend's native vocabulary
    pub fn map_preset(&self, preset: &str) -> String {
        (self.spec().map_preset)(preset)
    }

    /// Preset and rate-control arguments for this backend
    pub fn encoder_args(&self, quality: u32, preset: &str) -> Vec<String> {
        (self.spec().encoder_args)(quality, preset)
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|b| b.id().eq_ignore_ascii_case(id.trim()))
    }
}

impl std::fmt::Display for EncoderBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

fn map_preset_nvenc(preset: &str) -> String {
    // p1 is the fastest NVENC preset, p7 the slowest
    match preset.to_ascii_lowercase().as_str() {
        "veryslow" | "slower" | "slow" => "p7",
        "medium" => "p4",
        _ => "p1",
    }
    .to_string()
}

fn map_preset_qsv(preset: &str) -> String {
    let p = preset.to_ascii_lowercase();
    match p.as_str() {
        "veryfast" | "faster" | "fast" | "medium" => p,
        "slow" | "slower" | "veryslow" => "medium".to_string(),
        _ => "fast".to_string(),
    }
}

fn map_quality_amf(preset: &str) -> String {
    match preset.to_ascii_lowercase().as_str() {
        "veryslow" | "slower" | "slow" => "quality",
        "medium" => "balanced",
        _ => "speed",
    }
    .to_string()
}

fn map_preset_x265(preset: &str) -> String {
    preset.to_string()
}

fn nvenc_encoder_args(quality: u32, preset: &str) -> Vec<String> {
    vec![
        "-preset".into(),
        map_preset_nvenc(preset),
        "-rc".into(),
        "vbr".into(),
        "-cq".into(),
        quality.to_string(),
        // Without a zero bitrate NVENC caps the rate and -cq stops being constant quality
        "-b:v".into(),
        "0".into(),
    ]
}

fn qsv_encoder_args(quality: u32, preset: &str) -> Vec<String> {
    vec![
        "-preset".into(),
        map_preset_qsv(preset),
        "-global_quality".into(),
        quality.to_string(),
    ]
}

fn amf_encoder_args(quality: u32, preset: &str) -> Vec<String> {
    vec![
        "-usage".into(),
        "transcoding".into(),
        "-quality".into(),
        map_quality_amf(preset),
        "-rc".into(),
        "cqp".into(),
        "-qp_i".into(),
        quality.to_string(),
        "-qp_p".into(),
        quality.to_string(),
    ]
}

fn x265_encoder_args(quality: u32, preset: &str) -> Vec<String> {
    vec![
        "-preset".into(),
        map_preset_x265(preset),
        "-crf".into(),
        quality.to_string(),
    ]
}

// ============================================================================
// Capability detection
// ============================================================================

/// Answers whether a backend can actually encode on this machine
pub trait CapabilityProbe {
    fn probe(&self, backend: EncoderBackend) -> bool;
}

/// Capability probe that runs a short synthetic encode through ffmpeg
#[derive(Debug, Clone)]
pub struct FfmpegCapabilityProbe {
    ffmpeg: PathBuf,
}

impl FfmpegCapabilityProbe {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

/// Arguments for a half-second generated test pattern encoded to the null muxer
pub fn synthetic_probe_args(backend: EncoderBackend) -> Vec<OsString> {
    [
        "-hide_banner",
        "-nostdin",
        "-loglevel",
        "error",
        "-f",
        "lavfi",
        "-i",
        // NVENC rejects frames below roughly 145x49, so stay well above that
        "testsrc2=size=256x144:rate=10",
        "-t",
        "0.5",
        "-c:v",
        backend.ffmpeg_encoder(),
        "-f",
        "null",
        "-",
    ]
    .into_iter()
    .map(OsString::from)
    .collect()
}

impl CapabilityProbe for FfmpegCapabilityProbe {
    fn probe(&self, backend: EncoderBackend) -> bool {
        let status = Command::new(&self.ffmpeg)
            .args(synthetic_probe_args(backend))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(s) => s.success(),
            Err(e) => {
                tracing::debug!(backend = backend.id(), error = %e, "capability probe could not run");
                false
            }
        }
    }
}

/// Pick the first hardware backend whose synthetic encode succeeds,
/// falling back to software x265.
pub fn detect(probe: &dyn CapabilityProbe) -> EncoderBackend {
    for backend in HARDWARE_PRIORITY {
        let capable = probe.probe(backend);
        tracing::debug!(backend = backend.id(), capable, "hardware capability probe");
        if capable {
            tracing::info!(backend = backend.id(), "selected hardware encoder");
            return backend;
        }
    }

    tracing::info!("no hardware HEVC encoder available, using libx265");
    EncoderBackend::X265
}
