use crate::engine::hardware::EncoderBackend;
use std::path::{Path, PathBuf};

/// One file's encode request. Built once per input and never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub backend: EncoderBackend,
    pub quality: u32,
    pub preset: String,
}

impl EncodeJob {
    pub fn new(
        source: PathBuf,
        destination: PathBuf,
        backend: EncoderBackend,
        quality: u32,
        preset: impl Into<String>,
    ) -> Self {
        Self {
            source,
            destination,
            backend,
            quality,
            preset: preset.into(),
        }
    }

    /// Where ffmpeg writes while the encode is in flight.
    ///
    /// `movie_x265.mkv` becomes `movie_x265.partial.mkv`, so the destination
    /// name only ever holds a finished encode.
    pub fn partial_path(&self) -> PathBuf {
        partial_path_for(&self.destination)
    }
}

pub(crate) fn partial_path_for(destination: &Path) -> PathBuf {
    let stem = destination
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match destination.extension() {
        Some(ext) => format!("{}.partial.{}", stem, ext.to_string_lossy()),
        None => format!("{}.partial", stem),
    };
    destination.with_file_name(name)
}

/// Exit information of a finished encoder process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when the process was terminated by a signal
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ProcessExit {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// Result of driving one encode to completion
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeOutcome {
    Succeeded,
    Failed {
        exit_code: Option<i32>,
        diagnostics: String,
    },
    /// Interrupted by the user; the run stops after this
    Cancelled,
}

impl EncodeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}
